//! Error types for td-psola.

use thiserror::Error;

/// Error type for PSOLA engine operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input signal is empty")]
    EmptySignal,

    #[error("Invalid sample rate: {0}. Must be positive")]
    InvalidSampleRate(u32),

    #[error("Invalid {name}: {value}. Must be finite and positive")]
    InvalidScale { name: &'static str, value: f32 },

    #[error("Pitch track contains no voiced samples")]
    NoVoicedRegion,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
