//! # td-psola
//!
//! Time-domain Pitch-Synchronous Overlap-Add (TD-PSOLA) pitch shifting and
//! time-scale modification for monophonic speech.
//!
//! The pipeline runs block-offline over a full utterance:
//!
//! 1. **Pitch estimation** ([`pitch`]): centre-clipped autocorrelation over
//!    30 ms frames produces a per-sample fundamental-frequency track.
//! 2. **Voicing segmentation** ([`segment`]): the track is tiled into
//!    alternating unvoiced/voiced intervals.
//! 3. **Epoch marking** ([`epoch`]): per voiced interval, a candidate lattice
//!    grown outward from the interval's peak is searched with a Viterbi-style
//!    dynamic program for one consistent sequence of pitch marks.
//! 4. **Resynthesis** ([`synth`], [`unvoiced`]): voiced intervals are rebuilt
//!    by overlap-adding Hann-windowed frames at pitch- and time-scaled mark
//!    positions; unvoiced spans are scaled by 10 ms block remapping.
//!
//! All functions operate on raw `&[f32]` mono sample buffers; audio file I/O
//! belongs to the caller.
//!
//! ## Example
//!
//! ```rust
//! use td_psola::PsolaEngine;
//!
//! let sample_rate = 16_000;
//! // Half a second of a 200 Hz tone.
//! let samples: Vec<f32> = (0..8_000)
//!     .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / sample_rate as f32).sin())
//!     .collect();
//!
//! let engine = PsolaEngine::new(sample_rate).unwrap();
//! // Raise pitch by a fourth, keep the duration.
//! let shifted = engine.process(&samples, 1.33, 1.0).unwrap();
//! assert!(!shifted.is_empty());
//! ```

pub mod engine;
pub mod epoch;
pub mod error;
pub mod peaks;
pub mod pitch;
pub mod segment;
pub mod synth;
pub mod unvoiced;

pub use engine::{process, PsolaEngine};
pub use epoch::{mark, CandidateLattice, Column};
pub use error::{Error, Result};
pub use peaks::find_peaks;
pub use pitch::{median_filter, PitchEstimator};
pub use segment::{segment, Interval, Segmentation};
pub use synth::synthesize;
