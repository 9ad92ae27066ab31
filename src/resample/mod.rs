//! Variable-ratio sample rate conversion.
//!
//! [`Resampler`] is a block converter with a two-step protocol:
//!
//! 1. [`prepare`](Resampler::prepare) says how many input frames are needed
//!    to produce the next `n` output frames and hands out the scratch region
//!    to write them into.
//! 2. [`process`](Resampler::process) consumes however many frames were
//!    actually written and produces output.
//!
//! Fractional phase and unconsumed input carry over between calls so the
//! output is continuous. The stream-level wrapper is
//! [`ResamplingNode`](crate::nodes::ResamplingNode).

mod sinc;

pub use sinc::SincTable;

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::FRAC_1_SQRT_2;

use crate::biquad::{Coefficients, History};
use crate::error::{DspError, Result};
use crate::node::MAX_CHANNELS;

/// Output frames the internal buffers are pre-sized for.
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

/// Cutoff margin applied when downsampling, relative to the output Nyquist.
const DOWNSAMPLE_SAFETY: f64 = 0.97;

/// Corner of the optional IIR stages, relative to the lower Nyquist.
const IIR_CORNER: f64 = 0.9;

/// Interpolation kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    /// Nearest input frame
    Point,
    /// Straight line between adjacent frames
    Linear,
    /// Oversampled windowed-sinc table
    Sinc,
}

/// Resampler construction parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResamplerConfig {
    pub interpolation: Interpolation,
    /// Total number of sinc taps (rounded up to even)
    pub sinc_length: usize,
    /// Table points per input frame
    pub oversampling: usize,
    /// Number of cascaded 2nd-order low-pass stages (0 = none)
    pub filter_stages: usize,
}

impl ResamplerConfig {
    pub fn point() -> Self {
        Self { interpolation: Interpolation::Point, ..Self::default() }
    }

    pub fn linear() -> Self {
        Self { interpolation: Interpolation::Linear, ..Self::default() }
    }

    pub fn sinc() -> Self {
        Self::default()
    }

    pub fn with_sinc_length(mut self, taps: usize) -> Self {
        self.sinc_length = taps;
        self
    }

    pub fn with_oversampling(mut self, oversampling: usize) -> Self {
        self.oversampling = oversampling;
        self
    }

    pub fn with_filter_stages(mut self, stages: usize) -> Self {
        self.filter_stages = stages;
        self
    }
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Sinc,
            sinc_length: 32,
            oversampling: 64,
            filter_stages: 0,
        }
    }
}

enum Kernel {
    Point,
    Linear,
    Sinc(SincTable),
}

/// Cascade of low-pass sections with per-channel history.
struct IirCascade {
    coefficients: Coefficients,
    history: Vec<[History; MAX_CHANNELS]>,
}

impl IirCascade {
    fn new(stages: usize, corner: f64, sample_rate: f64) -> Option<Self> {
        if stages == 0 {
            return None;
        }
        Some(Self {
            coefficients: Coefficients::low_pass(corner, FRAC_1_SQRT_2, sample_rate),
            history: vec![[History::default(); MAX_CHANNELS]; stages],
        })
    }

    fn apply(&mut self, samples: &mut [f32], channels: usize) {
        let c = self.coefficients;
        for stage in self.history.iter_mut() {
            for frame in samples.chunks_exact_mut(channels) {
                for (sample, h) in frame.iter_mut().zip(stage.iter_mut()) {
                    *sample = h.tick(&c, *sample);
                }
            }
        }
    }

    fn reset(&mut self) {
        for stage in self.history.iter_mut() {
            stage.iter_mut().for_each(History::reset);
        }
    }
}

/// Block sample rate converter.
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Input frames advanced per output frame
    step: f64,
    kernel: Kernel,
    /// Frames of history needed behind the read position
    left: usize,
    /// Frames of look-ahead needed in front of the read position
    right: usize,

    /// Interleaved input frames, `frames` of which are valid
    buffer: Vec<f32>,
    frames: usize,
    /// Fractional read position in frames, relative to `buffer[0]`
    pos: f64,
    /// Frames handed out by the last `prepare`
    pending: usize,
    /// Buffer frame at which real input ended, once known
    end: Option<usize>,

    pre_filter: Option<IirCascade>,
    post_filter: Option<IirCascade>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize, config: ResamplerConfig) -> Result<Self> {
        if input_rate == 0 {
            return Err(DspError::InvalidSampleRate(input_rate));
        }
        if output_rate == 0 {
            return Err(DspError::InvalidSampleRate(output_rate));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(DspError::TooManyChannels(channels));
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let (kernel, left, right) = match config.interpolation {
            Interpolation::Point => (Kernel::Point, 0, 1),
            Interpolation::Linear => (Kernel::Linear, 0, 1),
            Interpolation::Sinc => {
                let cutoff = if ratio < 1.0 { ratio * DOWNSAMPLE_SAFETY } else { 1.0 };
                // widen with the cutoff so the kernel keeps the same number of zero crossings
                let crossings = (config.sinc_length.max(2) + 1) / 2;
                let half = (crossings as f64 / cutoff).ceil() as usize;
                let table = SincTable::new(half, config.oversampling, cutoff);
                (Kernel::Sinc(table), half - 1, half)
            }
        };

        let (pre_filter, post_filter) = if ratio < 1.0 {
            let corner = output_rate as f64 * 0.5 * IIR_CORNER;
            (IirCascade::new(config.filter_stages, corner, input_rate as f64), None)
        } else if ratio > 1.0 {
            let corner = input_rate as f64 * 0.5 * IIR_CORNER;
            (None, IirCascade::new(config.filter_stages, corner, output_rate as f64))
        } else {
            (None, None)
        };

        let step = input_rate as f64 / output_rate as f64;
        // room for one full block plus the history, look-ahead and end padding
        let capacity = (DEFAULT_BLOCK_FRAMES as f64 * step).ceil() as usize + left + 2 * right + 2;

        let mut resampler = Self {
            input_rate,
            output_rate,
            channels,
            step,
            kernel,
            left,
            right,
            buffer: vec![0.0; capacity * channels],
            frames: 0,
            pos: 0.0,
            pending: 0,
            end: None,
            pre_filter,
            post_filter,
        };
        resampler.reset();
        Ok(resampler)
    }

    #[inline]
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    #[inline]
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Input frames the converter must see ahead of the frame being produced.
    pub fn latency_frames(&self) -> usize {
        self.right
    }

    /// Clear all history. Only call on stream (re)initialization.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.frames = self.left;
        self.pos = self.left as f64;
        self.pending = 0;
        self.end = None;
        if let Some(f) = self.pre_filter.as_mut() {
            f.reset();
        }
        if let Some(f) = self.post_filter.as_mut() {
            f.reset();
        }
    }

    /// Input frames needed to produce `desired_output_frames`, and the
    /// zeroed scratch region to write them into (interleaved, exactly
    /// `required * channels` samples).
    ///
    /// Requests are capped at [`DEFAULT_BLOCK_FRAMES`] output frames so the
    /// buffers never grow; ask again for the rest.
    pub fn prepare(&mut self, desired_output_frames: usize) -> (usize, &mut [f32]) {
        let ch = self.channels;
        let desired = desired_output_frames.min(DEFAULT_BLOCK_FRAMES);
        let required = if desired == 0 || self.end.is_some() {
            0
        } else {
            let last = self.pos + (desired - 1) as f64 * self.step;
            let needed = last.floor() as usize + self.right + 1;
            let room = (self.buffer.len() / ch).saturating_sub(self.frames + self.right);
            needed.saturating_sub(self.frames).min(room)
        };

        let start = self.frames * ch;
        let stop = (self.frames + required) * ch;
        let scratch = &mut self.buffer[start..stop];
        scratch.fill(0.0);
        self.pending = required;
        (required, scratch)
    }

    /// Consume `input_frames` written into the prepared region and write up
    /// to `desired_output_frames` frames into `output`.
    ///
    /// If fewer frames were provided than requested, the missing tail stays
    /// zero and only the frames that could be computed from real input are
    /// produced. Returns the number of frames produced.
    pub fn process(&mut self, input_frames: usize, desired_output_frames: usize, output: &mut [f32]) -> usize {
        let ch = self.channels;
        let provided = input_frames.min(self.pending);
        self.pending = 0;

        if provided > 0 {
            let region = &mut self.buffer[self.frames * ch..(self.frames + provided) * ch];
            if let Some(filter) = self.pre_filter.as_mut() {
                filter.apply(region, ch);
            }
            self.frames += provided;
        }

        let desired = desired_output_frames.min(output.len() / ch);
        let pos0 = self.pos;
        let mut produced = 0;

        while produced < desired {
            let p = pos0 + produced as f64 * self.step;
            let idx = p.floor() as usize;
            if idx + self.right >= self.frames {
                break;
            }
            if let Some(end) = self.end {
                if idx >= end {
                    break;
                }
            }
            let frac = p - idx as f64;
            let out = &mut output[produced * ch..(produced + 1) * ch];
            self.interpolate(idx, frac, out);
            produced += 1;
        }

        if let Some(filter) = self.post_filter.as_mut() {
            filter.apply(&mut output[..produced * ch], ch);
        }

        self.pos = pos0 + produced as f64 * self.step;
        self.compact();
        produced
    }

    /// Mark the end of input. Pads the look-ahead with silence so the last
    /// real frames can still be produced, after which `process` returns 0.
    pub fn finish(&mut self) {
        if self.end.is_some() {
            return;
        }
        let ch = self.channels;
        self.end = Some(self.frames);
        let stop = (self.frames + self.right) * ch;
        self.buffer[self.frames * ch..stop].fill(0.0);
        self.frames += self.right;
    }

    /// True once [`finish`](Self::finish) was called and every real input
    /// frame has been consumed.
    pub fn is_drained(&self) -> bool {
        matches!(self.end, Some(end) if self.pos.floor() as usize >= end)
    }

    #[inline]
    fn interpolate(&self, idx: usize, frac: f64, out: &mut [f32]) {
        let ch = self.channels;
        match &self.kernel {
            Kernel::Point => {
                // never round up into the silence padded after the last frame
                let last_real = self.end.map_or(false, |end| idx + 1 >= end);
                let src = if frac >= 0.5 && !last_real { idx + 1 } else { idx };
                out.copy_from_slice(&self.buffer[src * ch..(src + 1) * ch]);
            }
            Kernel::Linear => {
                let t = frac as f32;
                let a = &self.buffer[idx * ch..(idx + 1) * ch];
                let b = &self.buffer[(idx + 1) * ch..(idx + 2) * ch];
                for ((o, &a), &b) in out.iter_mut().zip(a).zip(b) {
                    *o = a + (b - a) * t;
                }
            }
            Kernel::Sinc(table) => {
                out.fill(0.0);
                let half = table.half_length() as isize;
                for j in (1 - half)..=half {
                    let w = table.eval(j as f64 - frac);
                    let frame = (idx as isize + j) as usize;
                    let src = &self.buffer[frame * ch..(frame + 1) * ch];
                    for (o, &s) in out.iter_mut().zip(src) {
                        *o += s * w;
                    }
                }
            }
        }
    }

    /// Drop frames that can no longer be reached by the kernel.
    fn compact(&mut self) {
        let keep_from = (self.pos.floor() as usize).saturating_sub(self.left);
        let keep_from = keep_from.min(self.frames);
        if keep_from == 0 {
            return;
        }
        let ch = self.channels;
        self.buffer.copy_within(keep_from * ch..self.frames * ch, 0);
        self.frames -= keep_from;
        self.pos -= keep_from as f64;
        if let Some(end) = self.end.as_mut() {
            *end = end.saturating_sub(keep_from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(resampler: &mut Resampler, input: &[f32], out_frames: usize) -> Vec<f32> {
        let ch = resampler.channels();
        let mut out = vec![0.0; out_frames * ch];
        let (required, scratch) = resampler.prepare(out_frames);
        let n = required.min(input.len() / ch);
        scratch[..n * ch].copy_from_slice(&input[..n * ch]);
        let produced = resampler.process(n, out_frames, &mut out);
        out.truncate(produced * ch);
        out
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            Resampler::new(0, 48_000, 2, ResamplerConfig::linear()),
            Err(DspError::InvalidSampleRate(0))
        ));
        assert!(matches!(
            Resampler::new(44_100, 48_000, MAX_CHANNELS + 1, ResamplerConfig::linear()),
            Err(DspError::TooManyChannels(_))
        ));
    }

    #[test]
    fn prepare_asks_for_lookahead() {
        let mut r = Resampler::new(48_000, 48_000, 1, ResamplerConfig::linear()).unwrap();
        let (required, scratch) = r.prepare(10);
        assert_eq!(required, 11);
        assert_eq!(scratch.len(), 11);
    }

    #[test]
    fn short_input_reduces_output() {
        let mut r = Resampler::new(48_000, 48_000, 1, ResamplerConfig::linear()).unwrap();
        let input: Vec<f32> = (0..5).map(|i| i as f32).collect();
        let out = run(&mut r, &input, 10);
        // 5 frames in, one frame of look-ahead held back
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn finish_flushes_the_tail() {
        let mut r = Resampler::new(48_000, 48_000, 1, ResamplerConfig::linear()).unwrap();
        let input: Vec<f32> = (1..=4).map(|i| i as f32).collect();
        let first = run(&mut r, &input, 4);
        assert_eq!(first.len(), 3);

        r.finish();
        let mut out = vec![0.0; 4];
        let produced = r.process(0, 4, &mut out);
        assert_eq!(produced, 1);
        assert_eq!(out[0], 4.0);
        assert!(r.is_drained());
        assert_eq!(r.process(0, 4, &mut out), 0);
    }

    #[test]
    fn phase_carries_over_between_calls() {
        let input: Vec<f32> = (0..400).map(|i| (i as f32 * 0.05).sin()).collect();

        let mut whole = Resampler::new(44_100, 48_000, 1, ResamplerConfig::linear()).unwrap();
        let reference = run(&mut whole, &input, 300);

        let mut split = Resampler::new(44_100, 48_000, 1, ResamplerConfig::linear()).unwrap();
        let mut consumed = 0;
        let mut pieces = Vec::new();
        for block in [17usize, 100, 3, 180] {
            let mut out = vec![0.0; block];
            let (required, scratch) = split.prepare(block);
            scratch.copy_from_slice(&input[consumed..consumed + required]);
            consumed += required;
            let produced = split.process(required, block, &mut out);
            assert_eq!(produced, block);
            pieces.extend_from_slice(&out);
        }

        assert_eq!(reference.len(), 300);
        for (a, b) in reference.iter().zip(&pieces) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn upsampling_sinc_passes_input_frames_through() {
        // 2x upsampling: every even output frame lands on an input frame
        let mut r = Resampler::new(24_000, 48_000, 1, ResamplerConfig::sinc()).unwrap();
        let input: Vec<f32> = (0..200).map(|i| (i as f32 * 0.1).sin()).collect();
        let out = run(&mut r, &input, 300);
        for k in (0..out.len()).step_by(2) {
            assert!((out[k] - input[k / 2]).abs() < 1e-3, "frame {}", k);
        }
    }

    #[test]
    fn point_holds_the_last_frame_after_finish() {
        // 2x upsampling: every odd output frame sits at frac 0.5 and rounds up
        let mut r = Resampler::new(24_000, 48_000, 1, ResamplerConfig::point()).unwrap();
        let input = [0.25, 0.5, 0.75, 1.0];
        let first = run(&mut r, &input, 8);

        r.finish();
        let mut out = vec![0.0; 8];
        let produced = r.process(0, 8, &mut out);
        let mut all = first;
        all.extend_from_slice(&out[..produced]);

        assert_eq!(all, vec![0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn oversized_requests_are_capped_to_one_block() {
        let mut r = Resampler::new(48_000, 44_100, 2, ResamplerConfig::sinc()).unwrap();
        let capacity = r.buffer.len();
        let (block_required, _) = r.prepare(DEFAULT_BLOCK_FRAMES);
        let (required, scratch) = r.prepare(5 * DEFAULT_BLOCK_FRAMES);
        assert_eq!(required, block_required);
        assert_eq!(scratch.len(), required * 2);

        let input = vec![0.1; required * 2];
        r.prepare(5 * DEFAULT_BLOCK_FRAMES).1.copy_from_slice(&input);
        let mut out = vec![0.0; 5 * DEFAULT_BLOCK_FRAMES * 2];
        let produced = r.process(required, 5 * DEFAULT_BLOCK_FRAMES, &mut out);
        assert_eq!(produced, DEFAULT_BLOCK_FRAMES);

        r.finish();
        assert_eq!(r.buffer.len(), capacity);
    }
}
