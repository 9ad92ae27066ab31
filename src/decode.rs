//! Whole-file decoding to interleaved `f32`.

use std::path::Path;
use std::sync::Arc;

use symphonium::SymphoniumLoader;
use tracing::debug;

use crate::error::PeakError;
use crate::node::AudioFormat;

/// A fully decoded audio file.
#[derive(Clone, Debug)]
pub struct DecodedAudio {
    /// Interleaved samples, shared between players
    pub samples: Arc<[f32]>,
    pub format: AudioFormat,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.format.sample_rate.max(1) as f64
    }
}

/// Decode `path` at its native sample rate.
///
/// Blocking; keep it off the audio thread.
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedAudio, PeakError> {
    let path = path.as_ref();
    let decoded = SymphoniumLoader::new()
        .load_f32(path, None)
        .map_err(|e| PeakError::Decode(e.to_string()))?;

    let channels = decoded.channels();
    if channels == 0 || decoded.sample_rate == 0 {
        return Err(PeakError::EmptySource);
    }
    let samples: Arc<[f32]> = decoded.as_interleaved().into();
    debug!(path = %path.display(), channels, sample_rate = decoded.sample_rate, frames = samples.len() / channels, "decoded");

    Ok(DecodedAudio {
        samples,
        format: AudioFormat::new(decoded.sample_rate, channels),
    })
}
