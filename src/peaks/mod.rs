//! Waveform peak pyramids and their on-disk cache.
//!
//! A [`PeakFile`] summarizes a whole audio file as a set of levels, each
//! holding one [`PeakSample`] (peak and RMS, 16 bits each) per group of
//! frames. The finest level groups [`MIN_REDUCTION`] frames; every coarser
//! level halves the resolution of the one below it. Levels are ordered
//! coarsest first.
//!
//! ```no_run
//! use cuestream::peaks::{PeakCache, PeakCacheConfig};
//!
//! let cache = PeakCache::new(PeakCacheConfig::default());
//! let peaks = cache.generate_or_load("cue.wav")?;
//! let level = peaks.level_for_zoom(512.0);
//! println!("{} summary samples", level.samples.len());
//! # Ok::<(), cuestream::PeakError>(())
//! ```

mod builder;
mod cache;
mod format;

pub use builder::build_levels;
pub use cache::{spawn_generate, PeakCache, PeakCacheConfig, SourceInfo};
pub use format::{CACHE_EXTENSION, FORMAT_VERSION, MAGIC};

/// Frames summarized by one sample of the finest level.
pub const MIN_REDUCTION: u32 = 32;

/// Halving stops before a level would have fewer samples than this.
pub const MIN_SAMPLES: usize = 64;

/// Peak and RMS of a group of frames, quantized to 16 bits each and packed
/// as `peak << 16 | rms`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PeakSample(pub u32);

impl PeakSample {
    pub fn new(peak: f32, rms: f32) -> Self {
        Self((quantize(peak) as u32) << 16 | quantize(rms) as u32)
    }

    #[inline]
    pub fn peak(self) -> f32 {
        dequantize((self.0 >> 16) as u16)
    }

    #[inline]
    pub fn rms(self) -> f32 {
        dequantize(self.0 as u16)
    }
}

#[inline]
fn quantize(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}

#[inline]
fn dequantize(value: u16) -> f32 {
    value as f32 / u16::MAX as f32
}

/// One resolution of the pyramid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeakLevel {
    /// Source frames per summary sample
    pub reduction: u32,
    pub samples: Vec<PeakSample>,
}

/// The complete peak pyramid of one source file.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakFile {
    pub source: SourceInfo,
    pub sample_rate: u32,
    pub total_frames: u64,
    /// Coarsest first; never empty
    pub levels: Vec<PeakLevel>,
}

impl PeakFile {
    /// The finest level.
    pub fn finest(&self) -> &PeakLevel {
        &self.levels[self.levels.len() - 1]
    }

    /// The coarsest level.
    pub fn coarsest(&self) -> &PeakLevel {
        &self.levels[0]
    }

    /// Pick the coarsest level that still has at least one summary sample
    /// per `frames_per_pixel` frames, falling back to the finest level.
    pub fn level_for_zoom(&self, frames_per_pixel: f64) -> &PeakLevel {
        self.levels
            .iter()
            .find(|level| level.reduction as f64 <= frames_per_pixel)
            .unwrap_or_else(|| self.finest())
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / self.sample_rate.max(1) as f64
    }
}
