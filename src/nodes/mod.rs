//! Built-in stream nodes.
//!
//! Nodes are organized into two categories:
//!
//! ## Sources ([`source`])
//!
//! Produce audio without reading from another node:
//! - [`SamplePlayer`] - Play pre-decoded audio samples (seekable)
//! - [`Sine`] - Sine wave oscillator
//! - [`ResamplingNode`] - Wrap a node and convert its sample rate
//!
//! ## Effects ([`effect`])
//!
//! Wrap a source node and process what it produces:
//! - [`BiquadEq`] - Four-band parametric EQ
//! - [`LookAheadLimiter`] - Peak limiter with look-ahead delay
//! - [`FadingPanner`] - Volume fades and stereo panning
//! - [`MeteringNode`] - Peak/RMS metering tap
//! - [`MonoToStereo`] - Channel duplication
//! - [`Mixer`] - Sum any number of streams
//!
//! # Handles
//!
//! Nodes with runtime parameters are created together with a handle for the
//! control thread, e.g. `let (eq, eq_handle) = BiquadEq::new(source);`.
//! Changes sent through a handle take effect at the start of the node's next
//! `read`:
//! - [`EqHandle`] - Set bands on a [`BiquadEq`]
//! - [`LimiterHandle`] - Limiter parameters and gain-reduction metering
//! - [`FadeHandle`] - Start/cancel fades, pan, completion callbacks
//! - [`MeterHandle`] - Poll [`MeteringNode`] readings
//! - [`MixerHandle`] - Add/remove inputs, completion callbacks

pub mod effect;
pub mod source;

// Re-export common types at the top level for convenience
pub use effect::{
    BandSettings, BiquadEq, EqHandle, EqSettings, FadeCurve, FadeHandle, FadeOutcome, FadingPanner, InputEnd,
    InputId, LimiterHandle, LimiterSettings, LookAheadLimiter, MeterHandle, MeterReading, MeteringNode, Mixer,
    MixerConfig, MixerHandle, MonoToStereo,
};
pub use source::{ResamplingNode, SamplePlayer, Sine};
