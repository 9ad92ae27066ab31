//! Volume fades and stereo panning

use alloc::boxed::Box;

use hashbrown::HashMap;
use tracing::warn;

use crate::control::{event_queue, message_queue, EventQueue, EventReceiver, Handle, Inbox, DEFAULT_QUEUE_SIZE};
use crate::error::{DspError, Result};
use crate::node::{AudioFormat, StreamNode};

/// Shape of a fade over normalized time `t` in `0..=1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FadeCurve {
    #[default]
    Linear,
    /// Smoothstep, `-2t³ + 3t²`
    SCurve,
    /// `t²`
    Square,
    /// `√t`
    InverseSquare,
}

impl FadeCurve {
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => t * t * (3.0 - 2.0 * t),
            FadeCurve::Square => t * t,
            FadeCurve::InverseSquare => t.sqrt(),
        }
    }
}

/// How a fade ended, delivered to its completion callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeOutcome {
    /// `false` if the fade was cancelled or replaced before reaching its target
    pub completed: bool,
    /// Volume at the moment the fade ended
    pub volume: f32,
}

/// Messages to control a [`FadingPanner`].
#[derive(Clone, Copy, Debug)]
pub enum FadeMessage {
    Begin {
        target: f32,
        duration_ms: f32,
        curve: FadeCurve,
        /// Completion callback key on the handle side
        token: Option<u64>,
    },
    /// Stop the running fade where it is
    Cancel,
    /// Pan position, -1 (left) to 1 (right)
    SetPan(f32),
    SetPanning(bool),
}

#[derive(Clone, Copy, Debug)]
struct FadeEvent {
    token: u64,
    outcome: FadeOutcome,
}

type FadeCallback = Box<dyn FnOnce(FadeOutcome) + Send>;

/// Control-thread side of a [`FadingPanner`].
///
/// Completion callbacks stay on this side; [`poll`](Self::poll) runs the
/// ones whose fades have ended.
pub struct FadeHandle {
    sender: Handle<FadeMessage>,
    events: EventReceiver<FadeEvent>,
    callbacks: HashMap<u64, FadeCallback>,
    /// Event queue capacity; more callbacks than this could lose events
    max_pending: usize,
    next_token: u64,
}

impl FadeHandle {
    /// Start a fade without a completion callback.
    pub fn fade_to(&mut self, target: f32, duration_ms: f32, curve: FadeCurve) -> Result<()> {
        self.sender.try_send(FadeMessage::Begin {
            target,
            duration_ms,
            curve,
            token: None,
        })
    }

    /// Start a fade, replacing any fade in progress.
    ///
    /// `on_complete` runs from [`poll`](Self::poll) exactly once: with
    /// `completed = true` when the target is reached, or `false` with the
    /// volume at that moment if the fade is cancelled or replaced.
    ///
    /// Runs finished callbacks first. Fails with [`DspError::QueueFull`]
    /// while as many callbacks are pending as the event queue holds.
    pub fn begin_fade<F>(&mut self, target: f32, duration_ms: f32, curve: FadeCurve, on_complete: F) -> Result<()>
    where
        F: FnOnce(FadeOutcome) + Send + 'static,
    {
        self.poll();
        if self.callbacks.len() >= self.max_pending {
            return Err(DspError::QueueFull);
        }
        let token = self.next_token;
        self.sender.try_send(FadeMessage::Begin {
            target,
            duration_ms,
            curve,
            token: Some(token),
        })?;
        self.next_token += 1;
        self.callbacks.insert(token, Box::new(on_complete));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.sender.try_send(FadeMessage::Cancel)
    }

    pub fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.sender.try_send(FadeMessage::SetPan(pan))
    }

    pub fn set_panning(&mut self, enabled: bool) -> Result<()> {
        self.sender.try_send(FadeMessage::SetPanning(enabled))
    }

    /// Fades whose callbacks haven't run yet.
    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }

    /// Run callbacks for fades that ended. Returns how many ran.
    pub fn poll(&mut self) -> usize {
        let mut ran = 0;
        while let Some(event) = self.events.pop() {
            if let Some(callback) = self.callbacks.remove(&event.token) {
                callback(event.outcome);
                ran += 1;
            }
        }
        ran
    }
}

#[derive(Clone, Copy, Debug)]
struct Fade {
    start: f32,
    end: f32,
    curve: FadeCurve,
    length: u64,
    elapsed: u64,
    token: Option<u64>,
}

impl Fade {
    #[inline]
    fn volume(&self) -> f32 {
        let t = self.elapsed as f32 / self.length as f32;
        self.start + (self.end - self.start) * self.curve.apply(t)
    }
}

/// Fades the volume of its source along a [`FadeCurve`] and optionally pans
/// stereo sources.
///
/// Pan and fade are independent gain stages: the pan gains
/// `(1 - max(0, pan), 1 + min(0, pan))` are applied first, then the fade
/// envelope.
pub struct FadingPanner<S: StreamNode> {
    source: S,
    format: AudioFormat,
    volume: f32,
    fade: Option<Fade>,
    pan: f32,
    panning: bool,
    inbox: Inbox<FadeMessage>,
    events: EventQueue<FadeEvent>,
}

impl<S: StreamNode> FadingPanner<S> {
    pub fn new(source: S) -> (Self, FadeHandle) {
        let format = source.format();
        let (sender, inbox) = message_queue(DEFAULT_QUEUE_SIZE);
        // one event per callback, and the handle never holds more callbacks than this
        let max_pending = DEFAULT_QUEUE_SIZE * 2;
        let (events, receiver) = event_queue(max_pending);
        let panner = Self {
            source,
            format,
            volume: 1.0,
            fade: None,
            pan: 0.0,
            panning: false,
            inbox,
            events,
        };
        let handle = FadeHandle {
            sender,
            events: receiver,
            callbacks: HashMap::new(),
            max_pending,
            next_token: 0,
        };
        (panner, handle)
    }

    /// Start at `volume` instead of unity.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.max(0.0);
        self
    }

    pub fn current_volume(&self) -> f32 {
        self.volume
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    /// Panning only affects stereo sources.
    pub fn set_panning(&mut self, enabled: bool) {
        self.panning = enabled;
    }

    fn begin(&mut self, target: f32, duration_ms: f32, curve: FadeCurve, token: Option<u64>) {
        self.cancel();
        let target = target.max(0.0);
        let length = self.format.ms_to_frames(duration_ms) as u64;
        if length == 0 {
            self.volume = target;
            self.notify(token, true);
            return;
        }
        self.fade = Some(Fade {
            start: self.volume,
            end: target,
            curve,
            length,
            elapsed: 0,
            token,
        });
    }

    /// Freeze at the current volume; the running fade reports `completed = false`.
    fn cancel(&mut self) {
        if let Some(fade) = self.fade.take() {
            self.notify(fade.token, false);
        }
    }

    fn notify(&mut self, token: Option<u64>, completed: bool) {
        let Some(token) = token else {
            return;
        };
        let event = FadeEvent {
            token,
            outcome: FadeOutcome { completed, volume: self.volume },
        };
        if self.events.publish(event).is_err() {
            warn!(token, "fade event queue full, completion dropped");
        }
    }

    fn handle_messages(&mut self) {
        while let Some(msg) = self.inbox.pop() {
            match msg {
                FadeMessage::Begin { target, duration_ms, curve, token } => {
                    self.begin(target, duration_ms, curve, token)
                }
                FadeMessage::Cancel => self.cancel(),
                FadeMessage::SetPan(pan) => self.set_pan(pan),
                FadeMessage::SetPanning(on) => self.set_panning(on),
            }
        }
    }

    fn apply_pan(&self, samples: &mut [f32]) {
        if !self.panning || self.format.channels != 2 || self.pan == 0.0 {
            return;
        }
        let left = 1.0 - self.pan.max(0.0);
        let right = 1.0 + self.pan.min(0.0);
        for frame in samples.chunks_exact_mut(2) {
            frame[0] *= left;
            frame[1] *= right;
        }
    }

    /// Apply the fade envelope in place.
    fn apply_fade(&mut self, samples: &mut [f32]) {
        let ch = self.format.channels;
        let mut ramped = 0;

        if let Some(mut fade) = self.fade {
            for frame in samples.chunks_exact_mut(ch) {
                if fade.elapsed >= fade.length {
                    break;
                }
                fade.elapsed += 1;
                let volume = fade.volume();
                frame.iter_mut().for_each(|s| *s *= volume);
                self.volume = volume;
                ramped += ch;
            }
            if fade.elapsed >= fade.length {
                self.volume = fade.end;
                self.fade = None;
                self.notify(fade.token, true);
            } else {
                self.fade = Some(fade);
            }
        }

        // steady volume for the rest of the buffer
        let rest = &mut samples[ramped..];
        if self.volume == 0.0 {
            rest.fill(0.0);
        } else if self.volume != 1.0 {
            let volume = self.volume;
            rest.iter_mut().for_each(|s| *s *= volume);
        }
    }
}

impl<S: StreamNode> StreamNode for FadingPanner<S> {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.handle_messages();
        let n = self.source.read(buffer);
        let ch = self.format.channels;
        let samples = &mut buffer[..n - n % ch];
        self.apply_pan(samples);
        self.apply_fade(samples);
        n
    }
}
