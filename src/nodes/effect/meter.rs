//! Level metering

use crate::control::{meter_channel, MeterReceiver, MeterTap};
use crate::node::{AudioFormat, StreamNode};

/// Peak and RMS level over one metering window, across all channels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterReading {
    pub peak: f32,
    pub rms: f32,
}

/// Accumulates peak and RMS over fixed windows of frames.
#[derive(Clone, Debug)]
pub struct Meter {
    channels: usize,
    window: usize,
    frames: usize,
    peak: f32,
    sum_squares: f64,
}

impl Meter {
    pub fn new(channels: usize, window_frames: usize) -> Self {
        Self {
            channels: channels.max(1),
            window: window_frames.max(1),
            frames: 0,
            peak: 0.0,
            sum_squares: 0.0,
        }
    }

    pub fn window_frames(&self) -> usize {
        self.window
    }

    /// Feed interleaved samples; `on_window` gets a reading each time a
    /// window fills up.
    pub fn process(&mut self, samples: &[f32], mut on_window: impl FnMut(MeterReading)) {
        for frame in samples.chunks_exact(self.channels) {
            for &s in frame {
                self.peak = self.peak.max(s.abs());
                self.sum_squares += (s * s) as f64;
            }
            self.frames += 1;
            if self.frames == self.window {
                on_window(self.take());
            }
        }
    }

    fn take(&mut self) -> MeterReading {
        let count = (self.frames * self.channels) as f64;
        let reading = MeterReading {
            peak: self.peak,
            rms: (self.sum_squares / count).sqrt() as f32,
        };
        self.frames = 0;
        self.peak = 0.0;
        self.sum_squares = 0.0;
        reading
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.peak = 0.0;
        self.sum_squares = 0.0;
    }
}

/// Control-side receiver for a [`MeteringNode`].
pub struct MeterHandle {
    receiver: MeterReceiver<MeterReading>,
}

impl MeterHandle {
    /// The newest unread reading; readings produced while one was pending
    /// are dropped.
    pub fn poll(&mut self) -> Option<MeterReading> {
        self.receiver.take()
    }
}

/// Pass-through node that meters the signal flowing through it.
pub struct MeteringNode<S: StreamNode> {
    source: S,
    meter: Meter,
    tap: MeterTap<MeterReading>,
}

impl<S: StreamNode> MeteringNode<S> {
    pub fn new(source: S, window_frames: usize) -> (Self, MeterHandle) {
        let (tap, receiver) = meter_channel();
        let meter = Meter::new(source.format().channels, window_frames);
        (Self { source, meter, tap }, MeterHandle { receiver })
    }

    /// Readings dropped because the control side was not keeping up.
    pub fn dropped(&self) -> u64 {
        self.tap.dropped()
    }
}

impl<S: StreamNode> StreamNode for MeteringNode<S> {
    fn format(&self) -> AudioFormat {
        self.source.format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let n = self.source.read(buffer);
        let tap = &mut self.tap;
        self.meter.process(&buffer[..n], |reading| {
            tap.offer(reading);
        });
        n
    }
}
