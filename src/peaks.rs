//! Epoch-mark candidate selection within a waveform region
//!
//! Finds local maxima (with circular wrap-around at the region boundaries,
//! which matters for small regions), ranks them by amplitude and greedily
//! suppresses candidates that crowd a stronger, already-accepted one.

/// Number of auxiliary slots appended after the ranked candidates.
pub const AUX_SLOTS: usize = 5;

/// Locate epoch-mark candidates in `region`.
///
/// Returns a flat list of `max_candidates + AUX_SLOTS` sample indices in
/// global coordinates (`offset` is the region's global start):
///
/// - slots `0..max_candidates`: candidates ranked by descending amplitude,
///   zero-padded when fewer survive suppression. A zero entry marks an unused
///   slot, so global index 0 cannot carry a candidate.
/// - the five auxiliary slots: an unused marker (always 0), the index of the
///   region's minimum, the index of its maximum, the region start, and the
///   region's last sample. These feed the epoch marker's cost function only.
///
/// Suppression radius: any candidate within `round(len/7)` samples of a
/// higher-ranked accepted candidate is discarded.
pub fn find_peaks(region: &[f32], max_candidates: usize, offset: usize) -> Vec<usize> {
    let n = region.len();
    let mut out = vec![0usize; max_candidates + AUX_SLOTS];
    if n == 0 {
        return out;
    }

    // Local maxima with circular neighbours.
    let mut peaks: Vec<usize> = (0..n)
        .filter(|&i| {
            let prev = region[(i + n - 1) % n];
            let next = region[(i + 1) % n];
            region[i] >= prev && region[i] >= next
        })
        .collect();

    peaks.sort_by(|&a, &b| region[b].partial_cmp(&region[a]).unwrap());

    // Greedy non-maximum suppression into a new compacted list.
    let min_dur = (n as f32 / 7.0).round() as usize;
    let mut accepted: Vec<usize> = Vec::with_capacity(peaks.len());
    for &p in &peaks {
        if accepted.iter().all(|&q| p.abs_diff(q) >= min_dur) {
            accepted.push(p);
        }
    }

    for (slot, &p) in out.iter_mut().zip(accepted.iter().take(max_candidates)) {
        *slot = p + offset;
    }

    let (imin, imax) = min_max_indices(region);
    out[max_candidates] = 0;
    out[max_candidates + 1] = imin + offset;
    out[max_candidates + 2] = imax + offset;
    out[max_candidates + 3] = offset;
    out[max_candidates + 4] = offset + n - 1;
    out
}

/// Indices of the region's minimum and maximum values (first occurrence).
fn min_max_indices(region: &[f32]) -> (usize, usize) {
    let mut imin = 0usize;
    let mut imax = 0usize;
    for (i, &v) in region.iter().enumerate() {
        if v < region[imin] {
            imin = i;
        }
        if v > region[imax] {
            imax = i;
        }
    }
    (imin, imax)
}
