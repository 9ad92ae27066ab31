//! Audio sample player.

use alloc::sync::Arc;

use crate::decode::DecodedAudio;
use crate::node::{AudioFormat, Seekable, StreamNode};

/// Plays pre-decoded audio samples.
///
/// This is the file-backed source at the head of a cue chain: audio that's
/// already been decoded into memory as interleaved `f32`. The sample data is
/// shared, so several players of the same file are cheap.
///
/// A non-looping player returns a short read when it reaches the end, which
/// the [`Mixer`](crate::nodes::Mixer) takes as "finished".
pub struct SamplePlayer {
    samples: Arc<[f32]>,
    format: AudioFormat,
    /// Position in samples (always a multiple of the channel count)
    position: usize,
    looping: bool,
}

impl SamplePlayer {
    /// Create a player from interleaved audio samples.
    ///
    /// # Arguments
    ///
    /// - `samples` - Interleaved audio data (L, R, L, R, ... for stereo)
    /// - `channels` - Number of channels in the audio data
    /// - `sample_rate` - Sample rate of the audio data in Hz
    pub fn new(samples: impl Into<Arc<[f32]>>, channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mut samples: Arc<[f32]> = samples.into();
        // drop a trailing partial frame
        let whole = samples.len() - samples.len() % channels;
        if whole != samples.len() {
            samples = Arc::from(&samples[..whole]);
        }
        Self {
            samples,
            format: AudioFormat::new(sample_rate, channels),
            position: 0,
            looping: false,
        }
    }

    pub fn from_decoded(decoded: &DecodedAudio) -> Self {
        Self::new(decoded.samples.clone(), decoded.format.channels, decoded.format.sample_rate)
    }

    /// Enable or disable looping.
    ///
    /// When enabled, playback restarts from the beginning when it reaches the end.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Get the total duration in seconds.
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        (self.samples.len() / self.format.channels) as f64 / self.format.sample_rate as f64
    }

    /// Get the current playback position in seconds.
    #[inline]
    pub fn position_secs(&self) -> f64 {
        (self.position / self.format.channels) as f64 / self.format.sample_rate as f64
    }
}

impl StreamNode for SamplePlayer {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let total = self.samples.len();
        let mut written = 0;

        while written < buffer.len() {
            if self.position >= total {
                if self.looping && total > 0 {
                    self.position = 0;
                } else {
                    break;
                }
            }
            let n = (buffer.len() - written).min(total - self.position);
            buffer[written..written + n].copy_from_slice(&self.samples[self.position..self.position + n]);
            written += n;
            self.position += n;
        }

        written
    }
}

impl Seekable for SamplePlayer {
    fn position(&self) -> u64 {
        (self.position / self.format.channels) as u64
    }

    fn set_position(&mut self, frame: u64) {
        let sample = (frame as usize).saturating_mul(self.format.channels);
        self.position = sample.min(self.samples.len());
    }

    fn length(&self) -> Option<u64> {
        Some((self.samples.len() / self.format.channels) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_at_end() {
        let mut player = SamplePlayer::new(vec![1.0, 2.0, 3.0, 4.0], 2, 48_000);
        let mut buf = [0.0; 6];
        assert_eq!(player.read(&mut buf), 4);
        assert_eq!(&buf[..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(player.read(&mut buf), 0);
    }

    #[test]
    fn looping_wraps() {
        let mut player = SamplePlayer::new(vec![1.0, 2.0, 3.0], 1, 48_000).with_looping(true);
        let mut buf = [0.0; 7];
        assert_eq!(player.read(&mut buf), 7);
        assert_eq!(buf, [1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn seek_is_in_frames() {
        let mut player = SamplePlayer::new(vec![0.0, 0.0, 5.0, 6.0, 7.0, 8.0], 2, 48_000);
        player.set_position(1);
        assert_eq!(player.position(), 1);
        let mut buf = [0.0; 2];
        player.read(&mut buf);
        assert_eq!(buf, [5.0, 6.0]);
        player.set_position(99);
        assert_eq!(player.position(), 3);
        assert_eq!(player.length(), Some(3));
    }
}
