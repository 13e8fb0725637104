//! Orchestration of the PSOLA pipeline
//!
//! Normalizes the input, estimates a per-sample pitch track, segments it
//! into voiced/unvoiced intervals, then interleaves block-scaled unvoiced
//! spans with pitch-synchronously resynthesized voiced intervals in original
//! order.

use crate::epoch;
use crate::error::{Error, Result};
use crate::pitch::PitchEstimator;
use crate::segment;
use crate::synth;
use crate::unvoiced;

/// TD-PSOLA processing engine for monophonic speech.
///
/// The engine is stateless between calls; each [`process`](Self::process)
/// invocation is a pure function of its inputs.
pub struct PsolaEngine {
    sample_rate: u32,
    estimator: PitchEstimator,
}

impl PsolaEngine {
    /// Create an engine for the given sample rate in Hz.
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            estimator: PitchEstimator::new(sample_rate),
        })
    }

    /// Pitch-shift and time-scale a mono sample buffer.
    ///
    /// `pitch_scale` > 1 raises pitch; `time_scale` > 1 lengthens. 1.0 leaves
    /// the respective dimension unchanged.
    ///
    /// # Errors
    /// Fails fast on an empty signal, a non-positive scale factor, or a
    /// signal with no detectable voiced region.
    pub fn process(&self, samples: &[f32], pitch_scale: f32, time_scale: f32) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Err(Error::EmptySignal);
        }
        check_scale("pitch_scale", pitch_scale)?;
        check_scale("time_scale", time_scale)?;

        let x = normalize(samples);
        let pitch = self.estimator.track(&x);
        let seg = segment::segment(&pitch)?;
        tracing::debug!(
            voiced = seg.voiced.len(),
            unvoiced = seg.unvoiced.len(),
            "voicing segmentation"
        );

        let mut out = Vec::with_capacity((samples.len() as f32 * time_scale) as usize + 1);
        let mut cursor = 0usize;

        for interval in &seg.voiced {
            let data = &x[interval.start..interval.stop];
            let track = &pitch[interval.start..interval.stop];
            let (marks, _lattice) = epoch::mark(data, track, self.sample_rate);
            tracing::debug!(
                start = interval.start,
                stop = interval.stop,
                marks = marks.len(),
                "voiced interval marked"
            );

            if marks.len() < 2 {
                // No pitch-period information: copy the interval through
                // unchanged, scaling the unvoiced span up to its start.
                if cursor < interval.start {
                    out.extend(unvoiced::scale(
                        &x[cursor..interval.start],
                        self.sample_rate,
                        time_scale,
                    ));
                }
                out.extend_from_slice(data);
                cursor = interval.stop;
                continue;
            }

            let first_mark = interval.start + marks[0];
            let last_mark = interval.start + marks[marks.len() - 1];

            let lead_end = (first_mark + 1).min(x.len());
            if cursor < lead_end {
                out.extend(unvoiced::scale(
                    &x[cursor..lead_end],
                    self.sample_rate,
                    time_scale,
                ));
            }
            out.extend(synth::synthesize(data, &marks, pitch_scale, time_scale));
            cursor = last_mark + 2;
        }

        // Trailing material after the last voiced interval.
        if cursor < x.len() {
            out.extend(unvoiced::scale(&x[cursor..], self.sample_rate, time_scale));
        }

        tracing::debug!(input = samples.len(), output = out.len(), "psola complete");
        Ok(out)
    }
}

/// One-shot convenience wrapper around [`PsolaEngine`].
pub fn process(
    samples: &[f32],
    sample_rate: u32,
    pitch_scale: f32,
    time_scale: f32,
) -> Result<Vec<f32>> {
    PsolaEngine::new(sample_rate)?.process(samples, pitch_scale, time_scale)
}

/// Remove the mean and scale to unit peak magnitude. An all-constant signal
/// stays at zero and is reported as unvoiced downstream.
fn normalize(samples: &[f32]) -> Vec<f32> {
    let mut sum = 0.0f64;
    for &v in samples {
        sum += v as f64;
    }
    let mean = (sum / samples.len() as f64) as f32;

    let mut x: Vec<f32> = samples.iter().map(|&v| v - mean).collect();
    let peak = x.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
    if peak > 0.0 {
        for v in &mut x {
            *v /= peak;
        }
    }
    x
}

fn check_scale(name: &'static str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidScale { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(matches!(
            PsolaEngine::new(0),
            Err(Error::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_empty_signal_rejected() {
        let engine = PsolaEngine::new(16_000).unwrap();
        assert!(matches!(
            engine.process(&[], 1.0, 1.0),
            Err(Error::EmptySignal)
        ));
    }

    #[test]
    fn test_non_positive_scales_rejected() {
        let engine = PsolaEngine::new(16_000).unwrap();
        let samples = vec![0.1f32; 1_000];
        assert!(matches!(
            engine.process(&samples, 0.0, 1.0),
            Err(Error::InvalidScale {
                name: "pitch_scale",
                ..
            })
        ));
        assert!(matches!(
            engine.process(&samples, 1.0, -2.0),
            Err(Error::InvalidScale {
                name: "time_scale",
                ..
            })
        ));
        assert!(matches!(
            engine.process(&samples, f32::NAN, 1.0),
            Err(Error::InvalidScale { .. })
        ));
    }

    #[test]
    fn test_silence_has_no_voiced_region() {
        let engine = PsolaEngine::new(16_000).unwrap();
        let samples = vec![0.0f32; 8_000];
        assert!(matches!(
            engine.process(&samples, 1.0, 1.0),
            Err(Error::NoVoicedRegion)
        ));
    }

    #[test]
    fn test_normalize_removes_mean_and_scales_peak() {
        let x = normalize(&[1.0, 2.0, 3.0]);
        let sum: f32 = x.iter().sum();
        assert!(sum.abs() < 1e-6);
        let peak = x.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-6);
    }
}
