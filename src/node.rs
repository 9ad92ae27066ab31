//! Core stream trait and format types.

/// Maximum number of interleaved channels any node will process.
pub const MAX_CHANNELS: usize = 8;

/// Sample rate and channel layout of a stream.
///
/// Every node exposes one. Nodes wrapping each other must agree on the
/// channel count; sample-rate mismatches are resolved by inserting a
/// [`ResamplingNode`](crate::nodes::ResamplingNode).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: usize,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: usize) -> Self {
        Self { sample_rate, channels }
    }

    pub const fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    pub const fn stereo(sample_rate: u32) -> Self {
        Self::new(sample_rate, 2)
    }

    /// Convert a duration in milliseconds to whole frames at this rate.
    #[inline]
    pub fn ms_to_frames(&self, ms: f32) -> usize {
        ((ms.max(0.0) as f64 / 1000.0) * self.sample_rate as f64).round() as usize
    }
}

/// The pull contract implemented by every processing node.
///
/// A node produces audio only when asked. Wrapping nodes own the node they
/// read from, so a chain such as `Resampler → EQ → Fade → Limiter` is a single
/// owned value that the audio thread pulls from.
///
/// ```
/// use cuestream::{AudioFormat, StreamNode};
///
/// struct Dc {
///     level: f32,
/// }
///
/// impl StreamNode for Dc {
///     fn format(&self) -> AudioFormat {
///         AudioFormat::mono(48_000)
///     }
///
///     fn read(&mut self, buffer: &mut [f32]) -> usize {
///         buffer.fill(self.level);
///         buffer.len()
///     }
/// }
///
/// let mut dc = Dc { level: 0.25 };
/// let mut buf = [0.0; 64];
/// assert_eq!(dc.read(&mut buf), 64);
/// ```
pub trait StreamNode: Send + 'static {
    /// Format of the samples this node produces.
    fn format(&self) -> AudioFormat;

    /// Fill `buffer` with interleaved samples.
    ///
    /// `buffer.len()` should be a multiple of the channel count. Returns the
    /// number of samples written; anything less than `buffer.len()` means the
    /// stream has ended and the remainder of `buffer` is left untouched.
    fn read(&mut self, buffer: &mut [f32]) -> usize;
}

/// Sources that can be repositioned.
pub trait Seekable: StreamNode {
    /// Current read position in frames.
    fn position(&self) -> u64;

    /// Move the read position; clamped to the stream length.
    fn set_position(&mut self, frame: u64);

    /// Total length in frames, if known.
    fn length(&self) -> Option<u64> {
        None
    }
}

impl<N: StreamNode + ?Sized> StreamNode for Box<N> {
    #[inline]
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    #[inline]
    fn read(&mut self, buffer: &mut [f32]) -> usize {
        (**self).read(buffer)
    }
}
