//! Voiced/unvoiced segmentation of a pitch track
//!
//! Partitions a per-sample pitch track into alternating unvoiced and voiced
//! intervals. The tiling always starts with an unvoiced interval (possibly
//! empty) and exactly covers `[0, len)` with no gaps or overlaps.

use crate::error::{Error, Result};

/// Closed-open sample-index range `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Interval {
    pub start: usize,
    pub stop: usize,
}

impl Interval {
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }
}

/// Alternating unvoiced/voiced tiling of a pitch track.
///
/// Interleaving `unvoiced` and `voiced` in order (unvoiced first) reproduces
/// `[0, len)` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Segmentation {
    pub unvoiced: Vec<Interval>,
    pub voiced: Vec<Interval>,
}

/// Split a pitch track into alternating unvoiced and voiced intervals.
///
/// A transition from 0.0 to a non-zero pitch opens a voiced interval and
/// closes the preceding unvoiced one; the reverse transition does the
/// opposite. The final interval absorbs the tail of the track whatever its
/// type.
///
/// # Errors
/// [`Error::NoVoicedRegion`] if the track contains no voiced sample at all
/// (including an empty track).
pub fn segment(pitch: &[f32]) -> Result<Segmentation> {
    if !pitch.iter().any(|&p| p != 0.0) {
        return Err(Error::NoVoicedRegion);
    }

    let mut unvoiced = Vec::new();
    let mut voiced = Vec::new();
    let mut start = 0usize;
    let mut in_voiced = false;

    for (i, &p) in pitch.iter().enumerate() {
        let is_voiced = p != 0.0;
        if is_voiced != in_voiced {
            let interval = Interval { start, stop: i };
            if in_voiced {
                voiced.push(interval);
            } else {
                unvoiced.push(interval);
            }
            start = i;
            in_voiced = is_voiced;
        }
    }

    let tail = Interval {
        start,
        stop: pitch.len(),
    };
    if in_voiced {
        voiced.push(tail);
    } else {
        unvoiced.push(tail);
    }

    Ok(Segmentation { unvoiced, voiced })
}
