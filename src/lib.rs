//! cuestream - pull-based DSP core for live cue playback
//!
//! Design principles:
//! - Every node implements [`StreamNode`] and produces audio only when read
//! - A chain of nodes is one owned value, pulled by a single audio thread
//! - Parameters reach nodes through message ring buffers, not shared state
//! - No locks and no allocation on the audio thread once a chain is built
//! - Completion and metering events come back through bounded queues and are
//!   delivered when the control thread polls its handle
//! - Waveform peak pyramids are generated off the audio thread and cached on
//!   disk
//!
//! ```
//! use cuestream::nodes::{BiquadEq, BandSettings, FadingPanner, LimiterSettings, LookAheadLimiter, Sine};
//! use cuestream::{AudioFormat, StreamNode};
//!
//! let source = Sine::new(440.0, AudioFormat::stereo(48_000)).with_amplitude(0.9);
//! let (eq, mut eq_handle) = BiquadEq::new(source);
//! let (fade, _fade_handle) = FadingPanner::new(eq);
//! let (mut out, _limiter_handle) = LookAheadLimiter::new(fade, LimiterSettings::default().with_threshold(0.5));
//!
//! eq_handle.set_band(0, BandSettings::low_shelf(120.0, -6.0, 0.7)).unwrap();
//!
//! let mut block = [0.0; 512];
//! assert_eq!(out.read(&mut block), 512);
//! ```

extern crate alloc;

pub mod biquad;
pub mod buffer;
pub mod control;
pub mod decode;
mod error;
mod node;
pub mod nodes;
pub mod peaks;
pub mod resample;

#[cfg(feature = "cpal_sink")]
pub mod output;

pub use error::{DspError, PeakError, Result};
pub use node::{AudioFormat, Seekable, StreamNode, MAX_CHANNELS};
pub use peaks::{PeakCache, PeakCacheConfig, PeakFile};
