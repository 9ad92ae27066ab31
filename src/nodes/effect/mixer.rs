//! Mixer effect - sums any number of input streams

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::control::{event_queue, message_queue, EventQueue, EventReceiver, Handle, Inbox, DEFAULT_QUEUE_SIZE};
use crate::error::{DspError, Result};
use crate::node::{AudioFormat, StreamNode, MAX_CHANNELS};
use crate::nodes::effect::MonoToStereo;
use crate::nodes::source::ResamplingNode;
use crate::resample::ResamplerConfig;

/// Identifies an input added through a [`MixerHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId(u64);

/// Why an input left the mixer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The stream returned a short read
    Finished,
    /// [`MixerHandle::remove_input`]
    Removed,
    /// [`MixerHandle::stop_all`]
    Stopped,
}

/// Passed to an input's completion callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEnd {
    pub id: InputId,
    pub reason: EndReason,
}

/// Mixer construction parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixerConfig {
    /// Output format; inputs are converted to it
    pub format: AudioFormat,
    pub max_inputs: usize,
    /// Largest block summed in one pass, in frames; longer reads are split
    pub max_block: usize,
    /// Used for inputs whose sample rate differs from `format`
    pub resampler: ResamplerConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::stereo(48_000),
            max_inputs: 32,
            max_block: 1024,
            resampler: ResamplerConfig::default(),
        }
    }
}

impl MixerConfig {
    pub fn new(format: AudioFormat) -> Self {
        Self { format, ..Self::default() }
    }

    pub fn with_max_inputs(mut self, max_inputs: usize) -> Self {
        self.max_inputs = max_inputs;
        self
    }

    pub fn with_max_block(mut self, frames: usize) -> Self {
        self.max_block = frames;
        self
    }

    pub fn with_resampler(mut self, config: ResamplerConfig) -> Self {
        self.resampler = config;
        self
    }
}

enum MixerCommand {
    Add { id: InputId, stream: Box<dyn StreamNode> },
    Remove(InputId),
    /// Drop every input without running callbacks
    RemoveAll,
    /// End every input, running callbacks
    StopAll,
}

/// An input leaving the mixer. The stream rides along so it is dropped on
/// the control thread.
struct MixerEvent {
    id: InputId,
    reason: EndReason,
    silent: bool,
    stream: Box<dyn StreamNode>,
}

struct Input {
    id: InputId,
    stream: Box<dyn StreamNode>,
    finished: bool,
}

type InputCallback = Box<dyn FnOnce(InputEnd) + Send>;

/// Control-thread side of a [`Mixer`].
///
/// Adds and removes inputs, tracks which are still playing and runs
/// completion callbacks from [`poll`](Self::poll).
pub struct MixerHandle {
    format: AudioFormat,
    max_inputs: usize,
    resampler: ResamplerConfig,
    sender: Handle<MixerCommand>,
    events: EventReceiver<MixerEvent>,
    callbacks: HashMap<InputId, InputCallback>,
    playing: HashSet<InputId>,
    /// Streams handed to the mixer and not yet returned
    outstanding: usize,
    next_id: u64,
}

impl MixerHandle {
    /// Output format of the mixer.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Add a stream, converting sample rate and mono to stereo as needed.
    pub fn add_input<S: StreamNode>(&mut self, stream: S) -> Result<InputId> {
        self.add(Box::new(stream), None)
    }

    /// Like [`add_input`](Self::add_input), running `on_end` once when the
    /// input finishes, is removed or is stopped.
    pub fn add_input_with<S, F>(&mut self, stream: S, on_end: F) -> Result<InputId>
    where
        S: StreamNode,
        F: FnOnce(InputEnd) + Send + 'static,
    {
        self.add(Box::new(stream), Some(Box::new(on_end)))
    }

    fn add(&mut self, stream: Box<dyn StreamNode>, on_end: Option<InputCallback>) -> Result<InputId> {
        // returned streams free up slots
        self.poll();
        if self.outstanding >= self.max_inputs {
            return Err(DspError::TooManyInputs(self.max_inputs));
        }

        let stream = self.convert(stream)?;
        let id = InputId(self.next_id);
        self.sender.try_send(MixerCommand::Add { id, stream })?;

        self.next_id += 1;
        self.outstanding += 1;
        self.playing.insert(id);
        if let Some(callback) = on_end {
            self.callbacks.insert(id, callback);
        }
        debug!(?id, "mixer input added");
        Ok(id)
    }

    fn convert(&self, stream: Box<dyn StreamNode>) -> Result<Box<dyn StreamNode>> {
        let from = stream.format();
        let to = self.format;
        if from.channels > MAX_CHANNELS {
            return Err(DspError::TooManyChannels(from.channels));
        }
        if from.channels != to.channels && !(from.channels == 1 && to.channels == 2) {
            return Err(DspError::UnsupportedChannels {
                from: from.channels,
                to: to.channels,
            });
        }

        // resample before upmixing, so only one channel is converted
        let stream: Box<dyn StreamNode> = if from.sample_rate != to.sample_rate {
            debug!(from = from.sample_rate, to = to.sample_rate, "resampling mixer input");
            Box::new(ResamplingNode::new(stream, to.sample_rate, self.resampler)?)
        } else {
            stream
        };

        if from.channels != to.channels {
            Ok(Box::new(MonoToStereo::new(stream)))
        } else {
            Ok(stream)
        }
    }

    /// Stop an input and discard it. Its callback runs on a later
    /// [`poll`](Self::poll).
    pub fn remove_input(&mut self, id: InputId) -> Result<()> {
        if !self.playing.contains(&id) {
            return Err(DspError::UnknownInput(id));
        }
        self.sender.try_send(MixerCommand::Remove(id))?;
        self.playing.remove(&id);
        Ok(())
    }

    /// Discard every input without running their callbacks.
    pub fn remove_all(&mut self) -> Result<()> {
        self.sender.try_send(MixerCommand::RemoveAll)?;
        self.playing.clear();
        self.callbacks.clear();
        Ok(())
    }

    /// End every input; their callbacks run on the next [`poll`](Self::poll).
    pub fn stop_all(&mut self) -> Result<()> {
        self.sender.try_send(MixerCommand::StopAll)?;
        self.playing.clear();
        Ok(())
    }

    /// Whether `id` is still contributing (or about to) to the mix.
    pub fn is_playing(&self, id: InputId) -> bool {
        self.playing.contains(&id)
    }

    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    /// Collect ended inputs and run their callbacks. Returns how many inputs
    /// ended since the last poll.
    pub fn poll(&mut self) -> usize {
        let mut ended = 0;
        while let Some(event) = self.events.pop() {
            self.outstanding = self.outstanding.saturating_sub(1);
            self.playing.remove(&event.id);
            let callback = self.callbacks.remove(&event.id);
            if let (Some(callback), false) = (callback, event.silent) {
                callback(InputEnd {
                    id: event.id,
                    reason: event.reason,
                });
            }
            debug!(id = ?event.id, reason = ?event.reason, "mixer input ended");
            drop(event.stream);
            ended += 1;
        }
        ended
    }
}

/// Sums any number of input streams into one.
///
/// The mixer never ends: with no inputs it produces silence. An input that
/// returns a short read is taken as finished and is handed back to the
/// [`MixerHandle`].
pub struct Mixer {
    format: AudioFormat,
    inputs: Vec<Input>,
    scratch: Vec<f32>,
    commands: Inbox<MixerCommand>,
    events: EventQueue<MixerEvent>,
}

impl Mixer {
    pub fn new(config: MixerConfig) -> (Self, MixerHandle) {
        let format = config.format;
        let max_inputs = config.max_inputs.max(1);
        let (sender, commands) = message_queue(DEFAULT_QUEUE_SIZE + max_inputs);
        let (events, receiver) = event_queue(max_inputs);

        let mixer = Self {
            format,
            inputs: Vec::with_capacity(max_inputs),
            scratch: vec![0.0; config.max_block.max(1) * format.channels],
            commands,
            events,
        };
        let handle = MixerHandle {
            format,
            max_inputs,
            resampler: config.resampler,
            sender,
            events: receiver,
            callbacks: HashMap::new(),
            playing: HashSet::new(),
            outstanding: 0,
            next_id: 0,
        };
        (mixer, handle)
    }

    /// Create a stereo mixer with default limits
    pub fn stereo(sample_rate: u32) -> (Self, MixerHandle) {
        Self::new(MixerConfig::new(AudioFormat::stereo(sample_rate)))
    }

    /// Number of inputs currently mixed.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn handle_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                MixerCommand::Add { id, stream } => {
                    if self.inputs.len() < self.inputs.capacity() {
                        self.inputs.push(Input { id, stream, finished: false });
                    } else {
                        self.end(id, EndReason::Finished, false, stream);
                    }
                }
                MixerCommand::Remove(id) => {
                    if let Some(pos) = self.inputs.iter().position(|i| i.id == id) {
                        let input = self.inputs.remove(pos);
                        self.end(input.id, EndReason::Removed, false, input.stream);
                    }
                }
                MixerCommand::RemoveAll => self.end_all(EndReason::Removed, true),
                MixerCommand::StopAll => self.end_all(EndReason::Stopped, false),
            }
        }
    }

    fn end_all(&mut self, reason: EndReason, silent: bool) {
        while let Some(input) = self.inputs.pop() {
            self.end(input.id, reason, silent, input.stream);
        }
    }

    fn end(&mut self, id: InputId, reason: EndReason, silent: bool, stream: Box<dyn StreamNode>) {
        let event = MixerEvent { id, reason, silent, stream };
        if let Err(event) = self.events.publish(event) {
            // only reachable if the handle lost track of its inputs
            warn!(id = ?event.id, "mixer event queue full, dropping input on audio thread");
        }
    }

    /// Sum every input into `block`, at most `scratch` long.
    fn mix_block(&mut self, block: &mut [f32]) {
        let mut first = true;
        for input in self.inputs.iter_mut().filter(|i| !i.finished) {
            if first {
                let n = input.stream.read(block);
                if n < block.len() {
                    block[n..].fill(0.0);
                    input.finished = true;
                }
                first = false;
            } else {
                let scratch = &mut self.scratch[..block.len()];
                let n = input.stream.read(scratch);
                for (out, s) in block.iter_mut().zip(&scratch[..n]) {
                    *out += *s;
                }
                if n < block.len() {
                    input.finished = true;
                }
            }
        }
        if first {
            block.fill(0.0);
        }
    }
}

impl StreamNode for Mixer {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.handle_commands();

        if self.inputs.is_empty() {
            buffer.fill(0.0);
            return buffer.len();
        }

        let block_len = self.scratch.len();
        for block in buffer.chunks_mut(block_len) {
            self.mix_block(block);
        }

        let mut i = 0;
        while i < self.inputs.len() {
            if self.inputs[i].finished {
                let input = self.inputs.remove(i);
                self.end(input.id, EndReason::Finished, false, input.stream);
            } else {
                i += 1;
            }
        }

        buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::source::{SamplePlayer, Sine};

    #[test]
    fn short_reads_end_the_input_and_zero_the_rest() {
        let (mut mixer, mut handle) = Mixer::new(MixerConfig::new(AudioFormat::mono(48_000)));
        let id = handle.add_input(SamplePlayer::new(vec![0.5; 3], 1, 48_000)).unwrap();

        let mut buf = [1.0; 5];
        assert_eq!(mixer.read(&mut buf), 5);
        assert_eq!(buf, [0.5, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(mixer.input_count(), 0);
        assert!(handle.is_playing(id));
        assert_eq!(handle.poll(), 1);
        assert!(!handle.is_playing(id));
    }

    #[test]
    fn reads_longer_than_a_block_are_split() {
        let config = MixerConfig::new(AudioFormat::mono(48_000)).with_max_block(4);
        let (mut mixer, mut handle) = Mixer::new(config);
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        handle.add_input(SamplePlayer::new(data.clone(), 1, 48_000)).unwrap();
        handle.add_input(SamplePlayer::new(data.clone(), 1, 48_000)).unwrap();

        let mut buf = [0.0; 10];
        mixer.read(&mut buf);
        let doubled: Vec<f32> = data.iter().map(|s| s * 2.0).collect();
        assert_eq!(buf.to_vec(), doubled);
    }

    #[test]
    fn mono_input_is_upmixed_and_resampled() {
        let (mut mixer, mut handle) = Mixer::stereo(48_000);
        let sine = Sine::new(440.0, AudioFormat::mono(44_100));
        handle.add_input(sine).unwrap();

        let mut buf = vec![0.0; 2048];
        assert_eq!(mixer.read(&mut buf), 2048);
        for frame in buf.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert_eq!(mixer.input_count(), 1);
    }
}
