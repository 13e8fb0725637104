//! Pitch-epoch marking for one voiced interval
//!
//! Seeds at the interval's global-maximum sample, grows a lattice of
//! candidate columns outward in both directions by jumping roughly one local
//! pitch period at a time, then runs a Viterbi-style dynamic program over the
//! lattice to select one globally consistent sequence of epoch marks.
//!
//! Costs are log-probabilities: a per-candidate static cost favouring high
//! waveform amplitude, and a transition cost penalizing jumps whose length
//! deviates from the locally expected pitch period. All degenerate divisions
//! and logarithms clamp to a small positive epsilon so a path is never
//! discarded on numerical grounds.

use crate::peaks::{find_peaks, AUX_SLOTS};

/// Candidates requested per lattice column.
const MAX_CANDIDATES: usize = 3;

/// Fraction of the expected period searched on each side of a jump target.
const SEARCH_HALF_RATE: f32 = 0.3;

/// Transition-cost shape parameters.
const BETA: f32 = 0.7;
const GAMMA: f32 = 0.6;

/// Floor for probabilities and denominators before taking logarithms.
const PROB_FLOOR: f32 = 1e-9;

/// One column of the candidate lattice: ranked epoch-mark candidates plus the
/// amplitude extrema of the search window they came from.
#[derive(Debug, Clone)]
pub struct Column {
    /// Candidate sample indices, best-ranked first. May be empty when the
    /// search window's only peak coincided with the anchor.
    pub candidates: Vec<usize>,
    /// Index of the window's minimum amplitude.
    pub min_index: usize,
    /// Index of the window's maximum amplitude.
    pub max_index: usize,
}

/// Candidate lattice for one voiced interval, columns ordered left to right.
#[derive(Debug, Clone)]
pub struct CandidateLattice {
    pub columns: Vec<Column>,
    /// The seed sample: the interval's global maximum.
    pub anchor: usize,
}

/// Select epoch marks for one voiced interval.
///
/// `waveform` and `pitch` are the interval's slices (indices are local to the
/// interval); `pitch` is non-zero throughout a voiced interval. Returns the
/// chosen mark sequence in increasing order together with the lattice it was
/// selected from. A lattice that never grew beyond its anchor yields a
/// single-mark path; resynthesis must fall back to an identity copy then.
pub fn mark(waveform: &[f32], pitch: &[f32], sample_rate: u32) -> (Vec<usize>, CandidateLattice) {
    debug_assert_eq!(waveform.len(), pitch.len());
    debug_assert!(!waveform.is_empty());

    let fs = sample_rate as f32;
    let anchor = argmax(waveform);

    let right = grow(&waveform[anchor..], &pitch[anchor..], fs);

    let head: Vec<f32> = waveform[..=anchor].iter().rev().copied().collect();
    let head_pitch: Vec<f32> = pitch[..=anchor].iter().rev().copied().collect();
    let left = grow(&head, &head_pitch, fs);

    let mut columns = Vec::with_capacity(left.len() + 1 + right.len());
    for row in left.iter().rev() {
        columns.push(map_column(row, anchor, |local| anchor - local));
    }
    columns.push(Column {
        candidates: vec![anchor],
        min_index: anchor,
        max_index: anchor,
    });
    for row in &right {
        columns.push(map_column(row, anchor, |local| anchor + local));
    }

    let lattice = CandidateLattice { columns, anchor };
    tracing::trace!(
        columns = lattice.columns.len(),
        anchor,
        "candidate lattice grown"
    );

    let path = best_path(waveform, pitch, fs, &lattice);
    (path, lattice)
}

/// Grow candidate columns away from the slice start (the anchor sits at
/// local index 0), jumping roughly one local pitch period per column.
///
/// Returned rows are raw [`find_peaks`] results in slice-local coordinates.
fn grow(waveform: &[f32], pitch: &[f32], fs: f32) -> Vec<Vec<usize>> {
    let length = waveform.len();
    let mut columns = Vec::new();

    let mut duration = period_samples(pitch[0], fs);
    let mut i = duration;
    let mut last_target = 0usize;

    while i < length {
        let half = (duration as f32 * SEARCH_HALF_RATE).floor() as usize;
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(length);
        let row = find_peaks(&waveform[lo..hi], MAX_CANDIDATES, lo);
        let top = row[0];
        columns.push(row);

        duration = period_samples(pitch[top], fs);
        let next = top + duration;
        // A jump that fails to advance would re-select the same peak forever.
        if next <= last_target {
            break;
        }
        last_target = next;
        i = next;
    }
    columns
}

/// Expected pitch period in samples, clamped so an unvoiced (zero) pitch at
/// an interval boundary ends growth instead of dividing by zero.
fn period_samples(pitch: f32, fs: f32) -> usize {
    (fs / pitch.max(PROB_FLOOR)).round().max(1.0) as usize
}

/// Map a raw candidate row into interval coordinates. Zero entries are unused
/// slots; candidates that land on the anchor duplicate its own column and are
/// dropped.
fn map_column(row: &[usize], anchor: usize, to_global: impl Fn(usize) -> usize) -> Column {
    let slots = row.len() - AUX_SLOTS;
    let mut candidates = Vec::with_capacity(slots);
    for &c in &row[..slots] {
        if c == 0 {
            continue;
        }
        let global = to_global(c);
        if global != anchor {
            candidates.push(global);
        }
    }
    Column {
        candidates,
        min_index: to_global(row[slots + 1]),
        max_index: to_global(row[slots + 2]),
    }
}

/// Forward dynamic program over the lattice with explicit backpointers.
///
/// Transitions only connect strictly increasing sample positions; a column
/// whose candidates all end up unreachable under that rule is bridged over so
/// the surviving path stays strictly monotonic.
fn best_path(waveform: &[f32], pitch: &[f32], fs: f32, lattice: &CandidateLattice) -> Vec<usize> {
    let cols = &lattice.columns;
    let mut scores: Vec<Vec<f32>> = cols
        .iter()
        .map(|c| vec![f32::NEG_INFINITY; c.candidates.len()])
        .collect();
    let mut back: Vec<Vec<Option<(usize, usize)>>> = cols
        .iter()
        .map(|c| vec![None; c.candidates.len()])
        .collect();

    let duration = |s: usize| {
        if pitch[s] != 0.0 {
            fs / pitch[s]
        } else {
            0.0
        }
    };

    let mut prev_col: Option<usize> = None;
    for (k, col) in cols.iter().enumerate() {
        let mut reachable = false;
        for (j, &cand) in col.candidates.iter().enumerate() {
            let state = state_cost(
                waveform[cand],
                waveform[col.min_index],
                waveform[col.max_index],
            );
            match prev_col {
                None => {
                    scores[k][j] = state;
                    reachable = true;
                }
                Some(p) => {
                    let mut best: Option<(f32, usize)> = None;
                    for (pj, &prev) in cols[p].candidates.iter().enumerate() {
                        if prev >= cand || scores[p][pj] == f32::NEG_INFINITY {
                            continue;
                        }
                        let total = scores[p][pj]
                            + transition_cost(prev, cand, duration(prev), duration(cand));
                        if best.map_or(true, |(b, _)| total > b) {
                            best = Some((total, pj));
                        }
                    }
                    if let Some((total, pj)) = best {
                        scores[k][j] = total + state;
                        back[k][j] = Some((p, pj));
                        reachable = true;
                    }
                }
            }
        }
        if reachable {
            prev_col = Some(k);
        }
    }

    let last = match prev_col {
        Some(k) => k,
        None => return vec![lattice.anchor],
    };

    let mut best_j = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for (j, &score) in scores[last].iter().enumerate() {
        if score > best_score {
            best_score = score;
            best_j = j;
        }
    }

    let mut path = Vec::new();
    let mut cursor = Some((last, best_j));
    while let Some((k, j)) = cursor {
        path.push(cols[k].candidates[j]);
        cursor = back[k][j];
    }
    path.reverse();
    path
}

/// Log of the candidate's amplitude normalized against the column's
/// amplitude range; exactly zero when the range is degenerate.
fn state_cost(h: f32, lo: f32, hi: f32) -> f32 {
    if lo == hi {
        return 0.0;
    }
    ((h - lo) / (hi - lo) + PROB_FLOOR).ln()
}

/// Penalty for a jump whose length deviates from the mean expected period of
/// its endpoints. The reference raises a possibly negative base to a
/// fractional power through complex numbers; here the base's magnitude is
/// clamped positive before the logarithm.
fn transition_cost(prev: usize, cand: usize, d_prev: f32, d_cand: f32) -> f32 {
    let dur = 0.5 * (d_prev + d_cand);
    let deviation = (dur - cand.abs_diff(prev) as f32).abs();
    let denom = (1.0 - BETA * deviation).abs().max(PROB_FLOOR);
    GAMMA * (1.0 / denom).max(PROB_FLOOR).ln()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
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

    #[test]
    fn test_marks_follow_tone_period() {
        let waveform = generate_sine(16_000, 200.0, 0.4);
        let pitch = vec![200.0f32; waveform.len()];
        let (marks, lattice) = mark(&waveform, &pitch, 16_000);

        assert!(lattice.columns.len() > 10);
        assert!(marks.len() > 10, "expected many marks, got {}", marks.len());
        for pair in marks.windows(2) {
            assert!(pair[0] < pair[1], "marks must be strictly increasing");
            let gap = pair[1] - pair[0];
            assert!(
                (56..=104).contains(&gap),
                "gap {} strays too far from the 80-sample period",
                gap
            );
        }
        let span = (marks[marks.len() - 1] - marks[0]) as f32;
        let mean_gap = span / (marks.len() - 1) as f32;
        assert!(
            (mean_gap - 80.0).abs() < 4.0,
            "mean gap {} should be close to 80",
            mean_gap
        );
    }

    #[test]
    fn test_anchor_only_lattice() {
        // A single-period bump cannot grow past its anchor.
        let waveform: Vec<f32> = (0..40)
            .map(|i| (std::f32::consts::PI * i as f32 / 40.0).sin())
            .collect();
        let pitch = vec![200.0f32; waveform.len()];
        let (marks, lattice) = mark(&waveform, &pitch, 16_000);
        assert_eq!(lattice.columns.len(), 1);
        assert_eq!(marks, vec![lattice.anchor]);
    }

    #[test]
    fn test_state_cost_degenerate_range() {
        assert_eq!(state_cost(0.5, 0.5, 0.5), 0.0);
        assert!(state_cost(0.0, 0.0, 1.0).is_finite());
    }

    #[test]
    fn test_transition_cost_is_finite() {
        assert!(transition_cost(0, 80, 80.0, 80.0).is_finite());
        assert!(transition_cost(0, 80, 0.0, 0.0).is_finite());
        // Deviation at the 1/beta singularity must clamp, not overflow.
        assert!(transition_cost(0, 81, 79.57, 79.57).is_finite());
    }
}
