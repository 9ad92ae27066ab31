//! Sine wave oscillator

use core::f64::consts::TAU;

use crate::node::{AudioFormat, StreamNode};

/// A sine wave oscillator, the same signal on every channel.
///
/// Runs forever unless limited with [`with_frames`](Self::with_frames).
pub struct Sine {
    format: AudioFormat,
    frequency: f64,
    amplitude: f32,
    /// Frames produced so far
    frame: u64,
    limit: Option<u64>,
}

impl Sine {
    pub fn new(frequency: f32, format: AudioFormat) -> Self {
        Self {
            format,
            frequency: frequency.max(0.0) as f64,
            amplitude: 0.25, // -12dB, safe default
            frame: 0,
            limit: None,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// End the stream after `frames` frames.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency as f32
    }

    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
}

impl StreamNode for Sine {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let ch = self.format.channels;
        let rate = self.format.sample_rate.max(1) as f64;
        let mut frames = buffer.len() / ch;
        if let Some(limit) = self.limit {
            frames = frames.min(limit.saturating_sub(self.frame) as usize);
        }

        for out in buffer[..frames * ch].chunks_exact_mut(ch) {
            // phase from the frame counter, so long runs don't drift
            let phase = (self.frame as f64 * self.frequency / rate).fract();
            out.fill((phase * TAU).sin() as f32 * self.amplitude);
            self.frame += 1;
        }

        frames * ch
    }
}
