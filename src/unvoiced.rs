//! Time scaling of unvoiced spans by block remapping
//!
//! Unvoiced speech has no pitch concept, so spans between voiced intervals
//! are scaled by repeating or dropping fixed 10 ms blocks: each output block
//! copies the analysis block containing its time-warped source position
//! verbatim. The block boundaries are audible at some scale factors; this is
//! a deliberate simplification rather than resampling.

/// Analysis block length in seconds.
const BLOCK_SECONDS: f32 = 0.01;

/// Time-scale an unvoiced segment by block repetition/decimation.
///
/// The output is trimmed to its last full block boundary, so its length is
/// the largest multiple of the block size not exceeding
/// `ceil(time_scale * len)`, plus one sample.
pub fn scale(input: &[f32], sample_rate: u32, time_scale: f32) -> Vec<f32> {
    let block = (BLOCK_SECONDS * sample_rate as f32).round() as usize;
    if input.is_empty() || block == 0 {
        return Vec::new();
    }

    let analysis_starts: Vec<usize> = (0..input.len()).step_by(block).collect();
    let output_len = (time_scale * input.len() as f32).ceil() as usize;
    if output_len == 0 {
        return Vec::new();
    }
    let output_starts: Vec<usize> = (0..output_len).step_by(block).collect();

    let mut output = vec![0.0f32; output_len];
    for i in 0..output_starts.len().saturating_sub(1) {
        let source = (output_starts[i] as f32 / time_scale).round() as usize;
        for j in 0..analysis_starts.len().saturating_sub(1) {
            if analysis_starts[j] <= source && source <= analysis_starts[j + 1] {
                output[output_starts[i]..=output_starts[i + 1]]
                    .copy_from_slice(&input[analysis_starts[j]..=analysis_starts[j + 1]]);
            }
        }
    }

    output.truncate(output_starts[output_starts.len() - 1] + 1);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_trimmed_to_block_boundary() {
        let input = vec![0.25f32; 800];
        let out = scale(&input, 16_000, 2.0);
        // block = 160; ceil(2.0 * 800) = 1600; last start = 1440.
        assert_eq!(out.len(), 1441);
    }

    #[test]
    fn test_blocks_copied_verbatim() {
        let mut input = vec![0.0f32; 480];
        for (i, v) in input.iter_mut().enumerate() {
            *v = i as f32;
        }
        let out = scale(&input, 16_000, 1.0);
        // Unit scale reproduces whole blocks exactly.
        assert_eq!(out[..321], input[..321]);
    }

    #[test]
    fn test_compression_drops_blocks() {
        let input: Vec<f32> = (0..1600).map(|i| i as f32).collect();
        let out = scale(&input, 16_000, 0.5);
        assert!(out.len() < input.len());
        // Every output block must be a verbatim copy of some analysis block.
        let block = 160;
        for start in (0..out.len().saturating_sub(block)).step_by(block) {
            let first = out[start];
            for k in 0..block {
                assert_eq!(out[start + k], first + k as f32);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(scale(&[], 16_000, 2.0).is_empty());
    }
}
