//! Playing a node on a cpal output device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use thiserror::Error;
use tracing::{debug, warn};

use crate::node::{AudioFormat, StreamNode};

/// Samples converted per pass for integer device formats.
const CONVERT_CHUNK: usize = 4096;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("no output device available")]
    NoDevice,

    #[error(transparent)]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error(transparent)]
    Build(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    Play(#[from] cpal::PlayStreamError),

    #[error("unsupported device sample format {0:?}")]
    UnsupportedFormat(SampleFormat),
}

/// Shared between the device callback and [`CpalOutput`].
#[derive(Default)]
struct Status {
    frames_played: AtomicU64,
    ended: AtomicBool,
}

/// Pulls a [`StreamNode`] from a cpal device callback.
///
/// The node is moved into the callback and read directly there, so it runs
/// on the device's real-time thread. Once the node ends the device keeps
/// receiving silence. Dropping the output stops the stream.
pub struct CpalOutput {
    stream: cpal::Stream,
    format: AudioFormat,
    status: Arc<Status>,
}

impl CpalOutput {
    /// Play `node` on the system's default output device.
    pub fn default_output<N: StreamNode>(node: N) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;
        Self::start(&device, node)
    }

    /// The device's preferred format, to build a graph for.
    pub fn default_format() -> Result<AudioFormat, OutputError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(OutputError::NoDevice)?;
        let config = device.default_output_config()?;
        Ok(AudioFormat::new(config.sample_rate().0, config.channels() as usize))
    }

    /// Play `node` on `device`, opened with the node's rate and channel count.
    pub fn start<N: StreamNode>(device: &cpal::Device, node: N) -> Result<Self, OutputError> {
        let format = node.format();
        let sample_format = device.default_output_config()?.sample_format();
        let config = cpal::StreamConfig {
            channels: format.channels as u16,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let status = Arc::new(Status::default());

        let stream = match sample_format {
            SampleFormat::F32 => build::<f32, N>(device, &config, node, status.clone())?,
            SampleFormat::I16 => build::<i16, N>(device, &config, node, status.clone())?,
            SampleFormat::U16 => build::<u16, N>(device, &config, node, status.clone())?,
            other => return Err(OutputError::UnsupportedFormat(other)),
        };
        stream.play()?;
        debug!(?format, ?sample_format, "output stream started");

        Ok(Self { stream, format, status })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn frames_played(&self) -> u64 {
        self.status.frames_played.load(Ordering::Relaxed)
    }

    /// Whether the node has returned a short read.
    pub fn has_ended(&self) -> bool {
        self.status.ended.load(Ordering::Relaxed)
    }

    pub fn pause(&self) -> Result<(), cpal::PauseStreamError> {
        self.stream.pause()
    }

    pub fn resume(&self) -> Result<(), cpal::PlayStreamError> {
        self.stream.play()
    }
}

/// Device sample conversion from `f32`.
trait FromF32: SizedSample {
    fn from_f32(s: f32) -> Self;
}

impl FromF32 for f32 {
    #[inline]
    fn from_f32(s: f32) -> Self {
        s
    }
}

impl FromF32 for i16 {
    #[inline]
    fn from_f32(s: f32) -> Self {
        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

impl FromF32 for u16 {
    #[inline]
    fn from_f32(s: f32) -> Self {
        ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
    }
}

fn build<T: FromF32, N: StreamNode>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut node: N,
    status: Arc<Status>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = config.channels.max(1) as usize;
    let mut scratch = vec![0.0f32; CONVERT_CHUNK - CONVERT_CHUNK % channels];

    device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for out in data.chunks_mut(scratch.len()) {
                let buf = &mut scratch[..out.len()];
                let n = if status.ended.load(Ordering::Relaxed) {
                    0
                } else {
                    node.read(buf)
                };
                if n < buf.len() {
                    buf[n..].fill(0.0);
                    status.ended.store(true, Ordering::Relaxed);
                }
                for (o, &s) in out.iter_mut().zip(buf.iter()) {
                    *o = T::from_f32(s);
                }
            }
            status
                .frames_played
                .fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
        },
        |err| warn!(%err, "output stream error"),
        None,
    )
}
