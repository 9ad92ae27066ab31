//! Look-ahead peak limiter

use alloc::vec;
use alloc::vec::Vec;

use crate::buffer::DelayBuffer;
use crate::control::{message_queue, meter_channel, Handle, Inbox, MeterReceiver, MeterTap, DEFAULT_QUEUE_SIZE};
use crate::error::Result;
use crate::node::{AudioFormat, StreamNode};

pub const MIN_ATTACK_FRAMES: usize = 5;
pub const MAX_ATTACK_FRAMES: usize = 4096;
pub const MIN_RELEASE_FRAMES: usize = 5;

/// Frames processed per inner pass; bounds the scratch buffers.
const BLOCK_FRAMES: usize = 256;

/// Limiter parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimiterSettings {
    pub enabled: bool,
    /// Linear ceiling before input gain (1.0 = 0 dBFS)
    pub threshold: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    /// Linear gain applied after limiting
    pub input_gain: f32,
    /// Frames between gain-reduction meter readings
    pub samples_per_notification: usize,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            attack_ms: 5.0,
            release_ms: 60.0,
            input_gain: 1.0,
            samples_per_notification: 1024,
        }
    }
}

impl LimiterSettings {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_attack_ms(mut self, ms: f32) -> Self {
        self.attack_ms = ms;
        self
    }

    pub fn with_release_ms(mut self, ms: f32) -> Self {
        self.release_ms = ms;
        self
    }

    pub fn with_input_gain(mut self, gain: f32) -> Self {
        self.input_gain = gain;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_notification_interval(mut self, frames: usize) -> Self {
        self.samples_per_notification = frames;
        self
    }
}

/// Messages to control a [`LookAheadLimiter`].
#[derive(Clone, Copy, Debug)]
pub enum LimiterMessage {
    SetEnabled(bool),
    SetThreshold(f32),
    /// Attack time in milliseconds
    SetAttack(f32),
    /// Release time in milliseconds
    SetRelease(f32),
    SetInputGain(f32),
}

/// Control-thread side of a [`LookAheadLimiter`].
pub struct LimiterHandle {
    sender: Handle<LimiterMessage>,
    meter: MeterReceiver<f32>,
}

impl LimiterHandle {
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.sender.try_send(LimiterMessage::SetEnabled(enabled))
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        self.sender.try_send(LimiterMessage::SetThreshold(threshold))
    }

    pub fn set_attack_ms(&mut self, ms: f32) -> Result<()> {
        self.sender.try_send(LimiterMessage::SetAttack(ms))
    }

    pub fn set_release_ms(&mut self, ms: f32) -> Result<()> {
        self.sender.try_send(LimiterMessage::SetRelease(ms))
    }

    pub fn set_input_gain(&mut self, gain: f32) -> Result<()> {
        self.sender.try_send(LimiterMessage::SetInputGain(gain))
    }

    /// Latest gain reduction (`1 - min gain`) reported by the audio thread.
    ///
    /// Readings are coalesced: if this isn't called between two
    /// notifications the newer one is dropped.
    pub fn poll_meter(&mut self) -> Option<f32> {
        self.meter.take()
    }
}

/// Gain curve state: min-hold, release, then two smoothing trackers.
#[derive(Clone, Copy, Debug)]
struct Envelope {
    /// Minimum over the previous complete hold window
    hold_prev: f32,
    /// Minimum over the window being filled
    hold_cur: f32,
    hold_count: usize,
    released: f32,
    smooth1: f32,
    smooth2: f32,
}

impl Envelope {
    const UNITY: Self = Self {
        hold_prev: 1.0,
        hold_cur: 1.0,
        hold_count: 0,
        released: 1.0,
        smooth1: 1.0,
        smooth2: 1.0,
    };

    #[inline]
    fn next(&mut self, raw: f32, attack: usize, release_coeff: f32, smooth_coeff: f32, smooth_rate: f32) -> f32 {
        // min-hold: the held value covers at least the last `attack` frames
        self.hold_cur = self.hold_cur.min(raw);
        let held = self.hold_prev.min(self.hold_cur);
        self.hold_count += 1;
        if self.hold_count >= attack {
            self.hold_prev = self.hold_cur;
            self.hold_cur = 1.0;
            self.hold_count = 0;
        }

        self.released += (held - self.released) * release_coeff;
        self.released = self.released.min(held);

        self.smooth1 = track(self.smooth1, self.released, smooth_coeff, smooth_rate);
        self.smooth2 = track(self.smooth2, self.smooth1, smooth_coeff, smooth_rate);
        self.smooth2
    }
}

/// Move `current` toward `target` by the larger of an exponential step and a
/// constant rate, never past it.
#[inline]
fn track(current: f32, target: f32, coeff: f32, rate: f32) -> f32 {
    let distance = target - current;
    let step = (distance.abs() * coeff).max(rate).min(distance.abs());
    current + step.copysign(distance)
}

/// A look-ahead limiter.
///
/// The signal is delayed by the attack time while the gain curve is computed
/// from the undelayed input, so gain reduction is fully in place by the time
/// a peak reaches the output. Channels are linked: every channel of a frame
/// gets the same gain.
///
/// Once the attack window has elapsed the output never exceeds
/// `threshold * input_gain` (plus float rounding).
///
/// When the source ends the delayed tail is flushed before the limiter
/// returns its own short read.
pub struct LookAheadLimiter<S: StreamNode> {
    source: S,
    format: AudioFormat,
    settings: LimiterSettings,
    attack: usize,
    release: usize,
    delay: DelayBuffer,
    envelope: Envelope,
    gains: Vec<f32>,
    meter: MeterTap<f32>,
    meter_frames: usize,
    meter_min: f32,
    /// Frames of delayed tail still owed after the source ended
    tail_left: usize,
    source_ended: bool,
    inbox: Inbox<LimiterMessage>,
}

impl<S: StreamNode> LookAheadLimiter<S> {
    pub fn new(source: S, settings: LimiterSettings) -> (Self, LimiterHandle) {
        let format = source.format();
        let (sender, inbox) = message_queue(DEFAULT_QUEUE_SIZE);
        let (tap, meter) = meter_channel();
        let channels = format.channels.max(1);

        let mut limiter = Self {
            source,
            format,
            settings,
            attack: MIN_ATTACK_FRAMES,
            release: MIN_RELEASE_FRAMES,
            delay: DelayBuffer::new((MAX_ATTACK_FRAMES + BLOCK_FRAMES) * channels),
            envelope: Envelope::UNITY,
            gains: vec![1.0; BLOCK_FRAMES],
            meter: tap,
            meter_frames: 0,
            meter_min: 1.0,
            tail_left: 0,
            source_ended: false,
            inbox,
        };
        limiter.set_threshold(settings.threshold);
        limiter.set_attack_ms(settings.attack_ms);
        limiter.set_release_ms(settings.release_ms);
        limiter.set_input_gain(settings.input_gain);
        (limiter, LimiterHandle { sender, meter })
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    /// Delay added by the look-ahead, in frames. The same whether enabled
    /// or not, so toggling never repeats or skips audio.
    pub fn latency_frames(&self) -> usize {
        self.attack
    }

    pub fn attack_frames(&self) -> usize {
        self.attack
    }

    pub fn release_frames(&self) -> usize {
        self.release
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.settings.threshold = threshold.max(1e-6);
    }

    /// Clamped to [`MIN_ATTACK_FRAMES`]..=[`MAX_ATTACK_FRAMES`].
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.settings.attack_ms = ms;
        self.attack = self.format.ms_to_frames(ms).clamp(MIN_ATTACK_FRAMES, MAX_ATTACK_FRAMES);
    }

    /// Clamped to at least [`MIN_RELEASE_FRAMES`].
    pub fn set_release_ms(&mut self, ms: f32) {
        self.settings.release_ms = ms;
        self.release = self.format.ms_to_frames(ms).max(MIN_RELEASE_FRAMES);
    }

    pub fn set_input_gain(&mut self, gain: f32) {
        self.settings.input_gain = gain.max(0.0);
    }

    fn handle_messages(&mut self) {
        while let Some(msg) = self.inbox.pop() {
            match msg {
                LimiterMessage::SetEnabled(on) => self.set_enabled(on),
                LimiterMessage::SetThreshold(t) => self.set_threshold(t),
                LimiterMessage::SetAttack(ms) => self.set_attack_ms(ms),
                LimiterMessage::SetRelease(ms) => self.set_release_ms(ms),
                LimiterMessage::SetInputGain(g) => self.set_input_gain(g),
            }
        }
    }

    /// Limit one block of at most [`BLOCK_FRAMES`] frames in place.
    ///
    /// The envelope keeps tracking while disabled so re-enabling is
    /// already settled; only the delayed signal comes out.
    fn process_block(&mut self, block: &mut [f32]) {
        let ch = self.format.channels;
        let frames = block.len() / ch;
        let threshold = self.settings.threshold;
        let attack = self.attack;
        let release_coeff = 1.0 / (self.release as f32 + 1.0);
        let smooth_coeff = (4.0 / attack as f32).min(1.0);
        let smooth_rate = 3.0 / attack as f32;

        for (gain, frame) in self.gains[..frames].iter_mut().zip(block.chunks_exact(ch)) {
            let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let raw = if peak > threshold { threshold / peak } else { 1.0 };
            *gain = self
                .envelope
                .next(raw, attack, release_coeff, smooth_coeff, smooth_rate);
        }

        self.delay.push(block);
        let (first, second) = self.delay.get_delayed(block.len(), attack * ch);
        block[..first.len()].copy_from_slice(first);
        block[first.len()..first.len() + second.len()].copy_from_slice(second);

        if !self.settings.enabled {
            return;
        }

        let input_gain = self.settings.input_gain;
        for (frame, &gain) in block.chunks_exact_mut(ch).zip(&self.gains[..frames]) {
            let g = gain * input_gain;
            frame.iter_mut().for_each(|s| *s *= g);
        }

        self.update_meter(frames);
    }

    fn update_meter(&mut self, frames: usize) {
        let interval = self.settings.samples_per_notification;
        if interval == 0 {
            return;
        }
        let mut start = 0;
        while start < frames {
            let n = (interval - self.meter_frames).min(frames - start);
            let min = self.gains[start..start + n].iter().fold(self.meter_min, |m, &g| m.min(g));
            self.meter_min = min;
            self.meter_frames += n;
            start += n;
            if self.meter_frames >= interval {
                self.meter.offer(1.0 - self.meter_min);
                self.meter_frames = 0;
                self.meter_min = 1.0;
            }
        }
    }
}

impl<S: StreamNode> StreamNode for LookAheadLimiter<S> {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.handle_messages();
        let ch = self.format.channels;
        let buffer_len = buffer.len() - buffer.len() % ch;
        let buffer = &mut buffer[..buffer_len];

        let got = self.source.read(buffer);

        let mut valid = got;
        if got < buffer.len() {
            if !self.source_ended {
                self.source_ended = true;
                self.tail_left = self.attack;
            }
            let pad = ((buffer.len() - got) / ch).min(self.tail_left) * ch;
            buffer[got..got + pad].fill(0.0);
            self.tail_left -= pad / ch;
            valid += pad;
        } else {
            self.source_ended = false;
        }

        for block in buffer[..valid].chunks_mut(BLOCK_FRAMES * ch) {
            self.process_block(block);
        }
        valid
    }
}
