//! Pitch-synchronous overlap-add resynthesis for one voiced interval
//!
//! Given the interval's accepted epoch marks, builds Hann-windowed analysis
//! frames centred on each interior mark, derives a new synthesis-mark
//! timeline whose local density encodes the requested pitch scale and whose
//! span encodes the requested time scale, then overlap-adds crossfaded
//! frames at the scaled positions.

use rustfft::{num_complex::Complex, FftPlanner};

/// Resynthesize one voiced interval.
///
/// `marks` are the interval-local epoch marks in strictly increasing order.
/// With fewer than two marks there is no pitch-period information and the
/// interval is returned unchanged (identity fallback).
///
/// `pitch_scale` > 1 raises pitch, `time_scale` > 1 lengthens; both must be
/// positive (validated by the engine).
pub fn synthesize(input: &[f32], marks: &[usize], pitch_scale: f32, time_scale: f32) -> Vec<f32> {
    if marks.len() < 2 {
        return input.to_vec();
    }

    let n = input.len();
    let period = local_periods(input.len(), marks);
    let syn_marks = synthesis_marks(&period, marks[0], n, pitch_scale, time_scale);
    let frames = analysis_frames(input, marks);

    let out_marks: Vec<usize> = syn_marks
        .iter()
        .map(|&s| (s as f32 * time_scale).round() as usize)
        .collect();
    let last_out = out_marks[out_marks.len() - 1];

    let mut output = vec![0.0f32; last_out];
    let mut min_written = output.len();
    let mut max_written = 0usize;

    // Map each synthesis mark back onto the pair of analysis frames that
    // bracket it and overlap-add the crossfaded frame at the scaled position.
    let mut first_frame = 0usize;
    for j in 1..syn_marks.len().saturating_sub(1) {
        let mut bracket = None;
        for i in first_frame..marks.len().saturating_sub(2) {
            if marks[i] <= syn_marks[j] && syn_marks[j] < marks[i + 1] {
                bracket = Some(i);
                break;
            }
        }
        let Some(i) = bracket else { continue };
        first_frame = i;

        let k = interior_pos(i, marks.len());
        let gamma = (syn_marks[j] as f32 - marks[k] as f32) / (marks[k + 1] - marks[k]) as f32;
        let (first, second) = if frames.len() == 1 {
            (&frames[0], &frames[0])
        } else {
            let k = k.min(frames.len() - 1);
            (&frames[k - 1], &frames[k])
        };

        let mut blended = vec![0.0f32; first.len().max(second.len())];
        for (b, &v) in blended.iter_mut().zip(first.iter()) {
            *b = (1.0 - gamma) * v;
        }
        for (b, &v) in blended.iter_mut().zip(second.iter()) {
            *b += gamma * v;
        }

        let at = out_marks[j - 1];
        overlap_add(&mut output, &blended, at, &mut max_written);
        min_written = min_written.min(at);
    }

    tracing::trace!(
        marks = marks.len(),
        synthesis_marks = syn_marks.len(),
        min_written,
        max_written,
        "overlap-add complete"
    );

    let end = last_out.min(output.len());
    if min_written >= end {
        return Vec::new();
    }
    output[min_written..end].to_vec()
}

/// Local pitch period at every sample: the distance between its bracketing
/// epoch marks. Samples before the first mark and after the last inherit the
/// nearest bracketing period.
fn local_periods(len: usize, marks: &[usize]) -> Vec<f32> {
    let mut period = vec![0.0f32; len];
    for pair in marks.windows(2) {
        let span = (pair[1] - pair[0]) as f32;
        for p in &mut period[pair[0]..pair[1]] {
            *p = span;
        }
    }
    let first = marks[0];
    let last = marks[marks.len() - 1];
    let head = period[first];
    for p in &mut period[..first] {
        *p = head;
    }
    let tail = period[last - 1];
    for p in &mut period[last..] {
        *p = tail;
    }
    period
}

/// Derive the synthesis-mark timeline.
///
/// Starting from the first epoch mark, the analysis index advances until the
/// time-scaled squared advance overtakes the pitch-scaled accumulated local
/// period; each crossing becomes the next synthesis mark.
fn synthesis_marks(
    period: &[f32],
    first_mark: usize,
    len: usize,
    pitch_scale: f32,
    time_scale: f32,
) -> Vec<usize> {
    let mut syn = vec![first_mark];
    let mut count = 0usize;
    let mut index = first_mark;

    while index < len {
        let start = syn[count];
        let mut acc: f32 = period[start..=index.min(len - 1)].iter().sum();
        let mut lhs = 0.0f32;
        let mut rhs = 1.0f32;
        while lhs < rhs && index < len {
            index += 1;
            if index < len {
                acc += period[index];
            }
            let advance = (index - start) as f32;
            lhs = time_scale * advance * advance;
            rhs = acc / pitch_scale;
        }
        if lhs > rhs {
            count += 1;
            syn.push(index);
            index = syn[count] + 1;
        }
    }
    syn
}

/// Hann-windowed analysis frames, one per interior epoch mark, spanning from
/// the previous to the next mark. Each frame's spectrum is computed alongside
/// (zero-padded to the next power of two covering linear convolution) to
/// mirror the reference's intermediate state; output stays time-domain.
fn analysis_frames(input: &[f32], marks: &[usize]) -> Vec<Vec<f32>> {
    let count = marks.len().saturating_sub(2);
    let mut frames: Vec<Vec<f32>> = Vec::with_capacity(count);
    let mut spectra: Vec<Vec<Complex<f32>>> = Vec::with_capacity(count);
    let mut planner = FftPlanner::<f32>::new();

    for i in 1..marks.len().saturating_sub(1) {
        let left = marks[i - 1];
        let right = marks[i + 1];
        let window = hann(right - left + 1);
        let frame: Vec<f32> = input[left..=right]
            .iter()
            .zip(window.iter())
            .map(|(s, w)| s * w)
            .collect();

        let fft_len = (2 * frame.len() - 1).next_power_of_two();
        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .map(|&v| Complex::new(v, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(fft_len)
            .collect();
        let fft = planner.plan_fft_forward(fft_len);
        fft.process(&mut buffer);
        spectra.push(buffer);

        frames.push(frame);
    }

    tracing::trace!(
        frames = frames.len(),
        fft_len = spectra.first().map_or(0, |s| s.len()),
        "analysis frames windowed"
    );
    frames
}

/// Clamp a bracketing-frame index to the interior so both neighbouring
/// frames exist.
fn interior_pos(i: usize, mark_count: usize) -> usize {
    if i == 0 {
        1
    } else if i >= mark_count - 1 {
        mark_count - 2
    } else {
        i
    }
}

/// Symmetric Hann window, matching `numpy.hanning`.
fn hann(len: usize) -> Vec<f32> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|i| {
            let angle = 2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32;
            0.5 * (1.0 - angle.cos())
        })
        .collect()
}

/// Add `src` into `dst` at offset `at`, growing the buffer as needed
/// (amortized geometric growth via `Vec::resize`).
fn overlap_add(dst: &mut Vec<f32>, src: &[f32], at: usize, max_written: &mut usize) {
    let end = at + src.len();
    if end > *max_written {
        *max_written = end;
    }
    if dst.len() < end {
        dst.resize(end, 0.0);
    }
    for (d, &s) in dst[at..end].iter_mut().zip(src.iter()) {
        *d += s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(sample_rate: u32, freq: f32, duration: f32) -> Vec<f32> {
        let num_samples = (sample_rate as f32 * duration) as usize;
        (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    /// Marks at the peaks of a 200 Hz tone sampled at 16 kHz.
    fn tone_marks(len: usize) -> Vec<usize> {
        (20..len).step_by(80).collect()
    }

    #[test]
    fn test_identity_fallback_for_single_mark() {
        let input = generate_sine(16_000, 200.0, 0.05);
        let out = synthesize(&input, &[300], 1.0, 1.0);
        assert_eq!(out, input);
        let out = synthesize(&input, &[], 1.0, 1.0);
        assert_eq!(out, input);
    }

    #[test]
    fn test_local_periods_inherit_at_edges() {
        let period = local_periods(400, &[100, 180, 300]);
        assert_eq!(period[0], 80.0);
        assert_eq!(period[99], 80.0);
        assert_eq!(period[100], 80.0);
        assert_eq!(period[200], 120.0);
        assert_eq!(period[299], 120.0);
        assert_eq!(period[399], 120.0);
    }

    #[test]
    fn test_unit_scales_preserve_length() {
        let input = generate_sine(16_000, 200.0, 0.5);
        let marks = tone_marks(input.len());
        let out = synthesize(&input, &marks, 1.0, 1.0);
        let expected = input.len() - marks[0];
        let diff = (out.len() as i64 - expected as i64).unsigned_abs() as usize;
        assert!(
            diff < 3 * 80,
            "expected ~{} samples, got {}",
            expected,
            out.len()
        );
    }

    #[test]
    fn test_time_scale_stretches_output() {
        let input = generate_sine(16_000, 200.0, 0.5);
        let marks = tone_marks(input.len());
        let base = synthesize(&input, &marks, 1.0, 1.0).len() as f32;
        let stretched = synthesize(&input, &marks, 1.0, 2.0).len() as f32;
        let ratio = stretched / base;
        assert!(
            (ratio - 2.0).abs() < 0.15,
            "stretch ratio {} should be close to 2.0",
            ratio
        );
    }

    #[test]
    fn test_pitch_scale_compresses_mark_spacing() {
        let input = generate_sine(16_000, 200.0, 0.5);
        let marks = tone_marks(input.len());
        // Raising pitch packs more synthesis marks into the same span.
        let period = local_periods(input.len(), &marks);
        let unit = synthesis_marks(&period, marks[0], input.len(), 1.0, 1.0);
        let raised = synthesis_marks(&period, marks[0], input.len(), 1.25, 1.0);
        let unit_gap = (unit[unit.len() - 1] - unit[0]) as f32 / (unit.len() - 1) as f32;
        let raised_gap = (raised[raised.len() - 1] - raised[0]) as f32 / (raised.len() - 1) as f32;
        let ratio = unit_gap / raised_gap;
        assert!(
            (ratio - 1.25).abs() < 0.06,
            "mark-spacing ratio {} should be close to 1.25",
            ratio
        );
    }

    #[test]
    fn test_hann_matches_numpy_convention() {
        let w = hann(5);
        assert_eq!(w.len(), 5);
        assert!(w[0].abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!((w[1] - 0.5).abs() < 1e-6);
        assert_eq!(hann(1), vec![1.0]);
    }

    #[test]
    fn test_overlap_add_grows_buffer() {
        let mut dst = vec![1.0f32; 4];
        let mut max_written = 0usize;
        overlap_add(&mut dst, &[1.0, 1.0, 1.0], 3, &mut max_written);
        assert_eq!(dst.len(), 6);
        assert_eq!(max_written, 6);
        assert_eq!(dst, vec![1.0, 1.0, 1.0, 2.0, 1.0, 1.0]);
    }
}
