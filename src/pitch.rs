//! Fundamental-frequency estimation via centre-clipped autocorrelation
//!
//! Produces a per-sample pitch track for monophonic speech:
//!
//! 1. Slide a 30 ms analysis window with a 10 ms hop.
//! 2. Centre-clip each frame (zero everything below 30% of the frame peak,
//!    shift the rest toward zero) to flatten formant structure before
//!    correlating.
//! 3. Search the normalized autocorrelation over lags covering 70-500 Hz and
//!    accept the best lag only if it is a genuine interior peak with strong
//!    correlation.
//! 4. Median-filter the per-frame estimates (width 5) and broadcast them to
//!    every sample covered by the frame hop.
//!
//! Unvoiced or undetermined frames are encoded as 0.0 Hz in the track.

/// Analysis window length in seconds.
const FRAME_SECONDS: f32 = 0.03;

/// Hop between analysis frames in seconds.
const HOP_SECONDS: f32 = 0.01;

/// Fraction of the frame peak below which samples are clipped to zero.
const CLIP_RATE: f32 = 0.3;

/// Minimum normalized correlation for a frame to count as voiced.
const VOICING_THRESHOLD: f32 = 0.35;

/// Lag search band in Hz.
const MIN_PITCH_HZ: f32 = 70.0;
const MAX_PITCH_HZ: f32 = 500.0;

/// Width of the median filter applied to the per-frame estimates.
const MEDIAN_WIDTH: usize = 5;

/// Per-frame pitch estimator producing a per-sample track.
pub struct PitchEstimator {
    sample_rate: u32,
    frame_len: usize,
    frame_shift: usize,
    min_lag: usize,
    max_lag: usize,
}

impl PitchEstimator {
    /// Create an estimator for the given sample rate in Hz.
    pub fn new(sample_rate: u32) -> Self {
        let fs = sample_rate as f32;
        Self {
            sample_rate,
            frame_len: (fs * FRAME_SECONDS).round() as usize,
            frame_shift: (fs * HOP_SECONDS).round() as usize,
            min_lag: (fs / MAX_PITCH_HZ).round() as usize,
            max_lag: (fs / MIN_PITCH_HZ).round() as usize,
        }
    }

    /// Estimate a per-sample pitch track for `samples`.
    ///
    /// The returned track has the same length as the input; 0.0 marks
    /// unvoiced samples. Signals shorter than one analysis window are
    /// entirely unvoiced.
    pub fn track(&self, samples: &[f32]) -> Vec<f32> {
        let len = samples.len();
        if len < self.frame_len || self.frame_shift == 0 {
            return vec![0.0; len];
        }

        let frame_num = (len - self.frame_len) / self.frame_shift + 2;
        let mut frame_pitch = vec![0.0f32; frame_num + 2];
        for count in 1..frame_num {
            let start = (count - 1) * self.frame_shift;
            frame_pitch[count] = self.detect(&samples[start..start + self.frame_len]);
        }

        let frame_pitch = median_filter(&frame_pitch, MEDIAN_WIDTH);

        let mut pitch = vec![0.0f32; len];
        for (i, p) in pitch.iter_mut().enumerate() {
            let index = ((i + 1) / self.frame_shift).min(frame_pitch.len() - 1);
            *p = frame_pitch[index];
        }
        pitch
    }

    /// Detect the fundamental frequency of a single frame, or 0.0 if the
    /// frame is unvoiced.
    fn detect(&self, frame: &[f32]) -> f32 {
        let clipped = centre_clip(frame, CLIP_RATE);
        let corr = match normalized_autocorr(&clipped, self.max_lag) {
            Some(corr) => corr,
            None => return 0.0,
        };
        if self.min_lag == 0 || self.min_lag > corr.len() {
            return 0.0;
        }

        let mut best_lag = self.min_lag - 1;
        let mut best = corr[best_lag];
        for (lag, &value) in corr.iter().enumerate().skip(self.min_lag - 1) {
            if value > best {
                best = value;
                best_lag = lag;
            }
        }

        let min_corr = corr[..=best_lag]
            .iter()
            .fold(f32::INFINITY, |m, &v| m.min(v));

        if best > VOICING_THRESHOLD && min_corr < 0.0 && self.is_peak(best_lag, &corr) {
            self.sample_rate as f32 / (best_lag as f32 + 1.0)
        } else {
            0.0
        }
    }

    /// A lag qualifies only as an interior local maximum: not at either edge
    /// of the search band and not below either neighbour.
    fn is_peak(&self, lag: usize, corr: &[f32]) -> bool {
        if lag == self.min_lag || lag == self.max_lag {
            return false;
        }
        if lag == 0 || lag + 1 >= corr.len() {
            return false;
        }
        corr[lag] >= corr[lag - 1] && corr[lag] >= corr[lag + 1]
    }
}

/// Centre-clip a frame: samples within `clip_rate` times the peak magnitude
/// are zeroed, the rest are shifted toward zero by the clip level.
fn centre_clip(frame: &[f32], clip_rate: f32) -> Vec<f32> {
    let peak = frame.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
    let level = peak * clip_rate;
    frame
        .iter()
        .map(|&v| {
            if v > level {
                v - level
            } else if v < -level {
                v + level
            } else {
                0.0
            }
        })
        .collect()
}

/// Autocorrelation for lags `0..lags`, normalized by the zero-lag energy.
///
/// Returns `None` for an all-zero frame.
fn normalized_autocorr(frame: &[f32], lags: usize) -> Option<Vec<f32>> {
    let n = frame.len();
    let lags = lags.min(n);

    let mut r0 = 0.0f64;
    for &v in frame {
        r0 += v as f64 * v as f64;
    }
    if r0 <= f64::EPSILON {
        return None;
    }

    let mut corr = vec![0.0f32; lags];
    for (lag, value) in corr.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for j in 0..n - lag {
            acc += frame[j] as f64 * frame[j + lag] as f64;
        }
        *value = (acc / r0) as f32;
    }
    Some(corr)
}

/// Median filter with zero padding at the edges, suppressing isolated
/// per-frame estimation errors such as octave jumps.
pub fn median_filter(values: &[f32], width: usize) -> Vec<f32> {
    if values.is_empty() || width < 2 {
        return values.to_vec();
    }
    let half = width / 2;
    let mut out = vec![0.0f32; values.len()];
    let mut window = Vec::with_capacity(width);
    for (i, slot) in out.iter_mut().enumerate() {
        window.clear();
        for k in 0..width {
            let j = i as isize + k as isize - half as isize;
            if j < 0 || j >= values.len() as isize {
                window.push(0.0);
            } else {
                window.push(values[j as usize]);
            }
        }
        window.sort_by(|a, b| a.partial_cmp(b).unwrap());
        *slot = window[half];
    }
    out
}
