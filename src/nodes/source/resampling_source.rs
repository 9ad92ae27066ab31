//! Resampling node
//!
//! Pulls audio from a source at one sample rate and outputs it at another.

use crate::error::Result;
use crate::node::{AudioFormat, StreamNode};
use crate::resample::{Resampler, ResamplerConfig, DEFAULT_BLOCK_FRAMES};

/// A node that reads from `source` and resamples to `output_rate`.
///
/// When the source ends, the converter's look-ahead is flushed with silence
/// so the last real frames still come out; the node then returns a short
/// read like any other finished stream.
pub struct ResamplingNode<S: StreamNode> {
    source: S,
    resampler: Resampler,
    format: AudioFormat,
    source_done: bool,
}

impl<S: StreamNode> ResamplingNode<S> {
    /// Wrap `source`, converting to `output_rate`.
    ///
    /// Fails if the source reports a zero sample rate or more channels than
    /// [`MAX_CHANNELS`](crate::MAX_CHANNELS).
    pub fn new(source: S, output_rate: u32, config: ResamplerConfig) -> Result<Self> {
        let input = source.format();
        let resampler = Resampler::new(input.sample_rate, output_rate, input.channels, config)?;
        Ok(Self {
            source,
            resampler,
            format: AudioFormat::new(output_rate, input.channels),
            source_done: false,
        })
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.source
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: StreamNode> StreamNode for ResamplingNode<S> {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let ch = self.format.channels;
        let total = buffer.len() / ch;
        let mut done = 0;

        while done < total {
            let want = (total - done).min(DEFAULT_BLOCK_FRAMES);
            let out = &mut buffer[done * ch..(done + want) * ch];

            if self.source_done {
                let produced = self.resampler.process(0, want, out);
                done += produced;
                if produced < want {
                    break;
                }
                continue;
            }

            let (required, input) = self.resampler.prepare(want);
            let got = if required > 0 { self.source.read(input) } else { 0 };
            if got < required * ch {
                self.source_done = true;
            }
            done += self.resampler.process(got / ch, want, out);

            if self.source_done {
                self.resampler.finish();
            }
        }

        done * ch
    }
}
