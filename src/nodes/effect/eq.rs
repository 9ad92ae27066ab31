//! Four-band parametric EQ

use alloc::vec;
use alloc::vec::Vec;

use crate::biquad::{BandShape, Coefficients, History, MIN_BAND_FREQUENCY};
use crate::control::{message_queue, Handle, Inbox, DEFAULT_QUEUE_SIZE};
use crate::error::Result;
use crate::node::{AudioFormat, StreamNode};

/// Number of bands in a [`BiquadEq`].
pub const BAND_COUNT: usize = 4;

/// Parameters of one EQ band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandSettings {
    /// Center/corner frequency in Hz; below 5 Hz the band is disabled
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
    pub shape: BandShape,
}

impl BandSettings {
    pub const DISABLED: Self = Self {
        frequency: 0.0,
        gain_db: 0.0,
        q: 0.707,
        shape: BandShape::Bell,
    };

    pub fn bell(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self { frequency, gain_db, q, shape: BandShape::Bell }
    }

    pub fn low_shelf(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self { frequency, gain_db, q, shape: BandShape::LowShelf }
    }

    pub fn high_shelf(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self { frequency, gain_db, q, shape: BandShape::HighShelf }
    }

    pub fn notch(frequency: f32, q: f32) -> Self {
        Self { frequency, gain_db: 0.0, q, shape: BandShape::Notch }
    }

    /// Whether the band changes the signal at all.
    ///
    /// Bands under 5 Hz are off, and so are bells and shelves at 0 dB so a
    /// flat setting is bit-exact.
    pub fn is_active(&self) -> bool {
        if !(self.frequency >= MIN_BAND_FREQUENCY) {
            return false;
        }
        match self.shape {
            BandShape::Notch => true,
            _ => self.gain_db != 0.0,
        }
    }
}

impl Default for BandSettings {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Settings for all bands, applied in order.
pub type EqSettings = [BandSettings; BAND_COUNT];

/// Messages to control a [`BiquadEq`].
#[derive(Clone, Copy, Debug)]
pub enum EqMessage {
    SetBand(usize, BandSettings),
    SetAll(EqSettings),
    /// Clear filter history (stream restart)
    Reset,
}

/// Filter loop used for a given channel layout.
///
/// All three produce identical output; `Scalar` is the reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterPath {
    /// One sample at a time, any channel count
    Scalar,
    /// Unrolled left/right pair, stereo only
    Stereo,
    /// One strided pass per channel
    Interleaved,
}

impl FilterPath {
    pub fn for_channels(channels: usize) -> Self {
        match channels {
            1 => FilterPath::Scalar,
            2 => FilterPath::Stereo,
            _ => FilterPath::Interleaved,
        }
    }
}

/// Control-thread side of a [`BiquadEq`].
pub struct EqHandle {
    sender: Handle<EqMessage>,
}

impl EqHandle {
    pub fn set_band(&mut self, band: usize, settings: BandSettings) -> Result<()> {
        self.sender.try_send(EqMessage::SetBand(band, settings))
    }

    pub fn set_all(&mut self, settings: EqSettings) -> Result<()> {
        self.sender.try_send(EqMessage::SetAll(settings))
    }

    pub fn reset(&mut self) -> Result<()> {
        self.sender.try_send(EqMessage::Reset)
    }
}

/// Four cascaded Direct-Form-I biquads over an interleaved stream.
///
/// History is kept per band and channel and survives across reads of any
/// length, so consecutive blocks filter as one continuous signal.
pub struct BiquadEq<S: StreamNode> {
    source: S,
    format: AudioFormat,
    bands: EqSettings,
    coefficients: [Coefficients; BAND_COUNT],
    /// `history[band * channels + channel]`
    history: Vec<History>,
    path: FilterPath,
    inbox: Inbox<EqMessage>,
}

impl<S: StreamNode> BiquadEq<S> {
    pub fn new(source: S) -> (Self, EqHandle) {
        Self::with_settings(source, [BandSettings::DISABLED; BAND_COUNT])
    }

    pub fn with_settings(source: S, settings: EqSettings) -> (Self, EqHandle) {
        let format = source.format();
        let (sender, inbox) = message_queue(DEFAULT_QUEUE_SIZE);
        let mut eq = Self {
            source,
            format,
            bands: [BandSettings::DISABLED; BAND_COUNT],
            coefficients: [Coefficients::IDENTITY; BAND_COUNT],
            history: vec![History::default(); BAND_COUNT * format.channels],
            path: FilterPath::for_channels(format.channels),
            inbox,
        };
        eq.set_all(settings);
        (eq, EqHandle { sender })
    }

    /// Force a specific filter loop. `Stereo` is ignored for non-stereo streams.
    pub fn with_path(mut self, path: FilterPath) -> Self {
        if path != FilterPath::Stereo || self.format.channels == 2 {
            self.path = path;
        }
        self
    }

    pub fn path(&self) -> FilterPath {
        self.path
    }

    pub fn bands(&self) -> &EqSettings {
        &self.bands
    }

    /// Change one band. Out-of-range indices are ignored.
    pub fn set_band(&mut self, band: usize, settings: BandSettings) {
        let Some(slot) = self.bands.get_mut(band) else {
            return;
        };
        *slot = settings;
        if settings.is_active() {
            self.coefficients[band] = Coefficients::band(
                settings.shape,
                settings.frequency,
                settings.gain_db,
                settings.q,
                self.format.sample_rate,
            );
        }
    }

    pub fn set_all(&mut self, settings: EqSettings) {
        for (band, s) in settings.into_iter().enumerate() {
            self.set_band(band, s);
        }
    }

    /// Clear all filter history.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(History::reset);
    }

    /// Combined magnitude response of the active bands, in dB.
    pub fn magnitude_db(&self, frequency: f32) -> f32 {
        self.bands
            .iter()
            .zip(&self.coefficients)
            .filter(|(b, _)| b.is_active())
            .map(|(_, c)| c.magnitude_db(frequency, self.format.sample_rate))
            .sum()
    }

    fn handle_messages(&mut self) {
        while let Some(msg) = self.inbox.pop() {
            match msg {
                EqMessage::SetBand(band, settings) => self.set_band(band, settings),
                EqMessage::SetAll(settings) => self.set_all(settings),
                EqMessage::Reset => self.reset(),
            }
        }
    }

    /// Run every active band over `samples` in place.
    pub fn apply(&mut self, samples: &mut [f32]) {
        let ch = self.format.channels;
        let len = samples.len() - samples.len() % ch;
        let samples = &mut samples[..len];

        for band in 0..BAND_COUNT {
            if !self.bands[band].is_active() {
                continue;
            }
            let c = self.coefficients[band];
            let history = &mut self.history[band * ch..(band + 1) * ch];
            match self.path {
                FilterPath::Scalar => apply_scalar(&c, history, samples),
                FilterPath::Stereo => apply_stereo(&c, history, samples),
                FilterPath::Interleaved => apply_interleaved(&c, history, samples),
            }
        }
    }
}

fn apply_scalar(c: &Coefficients, history: &mut [History], samples: &mut [f32]) {
    let ch = history.len();
    for (i, sample) in samples.iter_mut().enumerate() {
        *sample = history[i % ch].tick(c, *sample);
    }
}

fn apply_stereo(c: &Coefficients, history: &mut [History], samples: &mut [f32]) {
    let mut left = history[0];
    let mut right = history[1];
    for frame in samples.chunks_exact_mut(2) {
        frame[0] = left.tick(c, frame[0]);
        frame[1] = right.tick(c, frame[1]);
    }
    history[0] = left;
    history[1] = right;
}

fn apply_interleaved(c: &Coefficients, history: &mut [History], samples: &mut [f32]) {
    let ch = history.len();
    for (channel, h) in history.iter_mut().enumerate() {
        let mut local = *h;
        for sample in samples[channel..].iter_mut().step_by(ch) {
            *sample = local.tick(c, *sample);
        }
        *h = local;
    }
}

impl<S: StreamNode> StreamNode for BiquadEq<S> {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.handle_messages();
        let n = self.source.read(buffer);
        self.apply(&mut buffer[..n]);
        n
    }
}
