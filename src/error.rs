//! Error types

use thiserror::Error;

use crate::nodes::effect::InputId;

/// Configuration errors reported by graph construction and control handles.
///
/// An operation that fails with one of these is a no-op: the graph keeps
/// running with its previous state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    /// Channel layouts that cannot be converted into each other
    #[error("cannot convert {from} channel(s) to {to} channel(s)")]
    UnsupportedChannels { from: usize, to: usize },

    /// Channel count above [`MAX_CHANNELS`](crate::MAX_CHANNELS)
    #[error("{0} channels exceeds the supported maximum")]
    TooManyChannels(usize),

    /// Mixer is already at capacity
    #[error("mixer already has the maximum of {0} inputs")]
    TooManyInputs(usize),

    /// Zero sample rate
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// The control queue to the audio thread is full (consumer stalled)
    #[error("control queue is full")]
    QueueFull,

    /// Mixer input that is not (or no longer) registered
    #[error("unknown mixer input {0:?}")]
    UnknownInput(InputId),
}

/// Result type for graph and control operations
pub type Result<T, E = DspError> = core::result::Result<T, E>;

/// Errors raised while decoding audio or reading/writing peak files.
#[derive(Error, Debug)]
pub enum PeakError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode source audio: {0}")]
    Decode(String),

    #[error("source contains no audio")]
    EmptySource,

    #[error("not a peak file")]
    BadMagic,

    #[error("unsupported peak file version {0}")]
    UnsupportedVersion(u32),

    #[error("corrupt peak file: {0}")]
    Corrupt(&'static str),

    #[error("peak file was written for a different source")]
    Stale,
}
