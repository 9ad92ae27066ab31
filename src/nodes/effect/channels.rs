//! Channel layout conversion

use crate::node::{AudioFormat, StreamNode};

/// Duplicates a mono source onto both channels of a stereo stream.
pub struct MonoToStereo<S: StreamNode> {
    source: S,
    format: AudioFormat,
}

impl<S: StreamNode> MonoToStereo<S> {
    /// `source` is expected to be mono; any extra channels would be read as
    /// consecutive mono frames.
    pub fn new(source: S) -> Self {
        let format = AudioFormat::stereo(source.format().sample_rate);
        Self { source, format }
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: StreamNode> StreamNode for MonoToStereo<S> {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let frames = buffer.len() / 2;
        let got = self.source.read(&mut buffer[..frames]);

        // expand in place, back to front so nothing is overwritten early
        for i in (0..got).rev() {
            let s = buffer[i];
            buffer[2 * i] = s;
            buffer[2 * i + 1] = s;
        }
        got * 2
    }
}
