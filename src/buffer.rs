//! Fixed-capacity circular sample buffer used for look-ahead delay lines.

use alloc::vec;
use alloc::vec::Vec;

/// Power-of-two circular buffer of `f32` samples.
///
/// The buffer starts out zeroed, so any offset up to the capacity can be read
/// back immediately; reading "before" the first push yields silence.
pub struct DelayBuffer {
    data: Vec<f32>,
    mask: usize,
    /// Next write position (always wrapped)
    head: usize,
}

impl DelayBuffer {
    /// Create a buffer holding at least `capacity` samples.
    ///
    /// The real capacity is rounded up to the next power of two so indices can
    /// be masked instead of taken modulo.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            data: vec![0.0; capacity],
            mask: capacity - 1,
            head: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Append samples, advancing the head by exactly `samples.len()`.
    ///
    /// If more than `capacity` samples are pushed at once only the newest
    /// `capacity` survive.
    pub fn push(&mut self, samples: &[f32]) {
        let cap = self.data.len();
        let skipped = samples.len().saturating_sub(cap);
        let src = &samples[skipped..];

        let start = (self.head + skipped) & self.mask;
        let first = (cap - start).min(src.len());
        self.data[start..start + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        self.data[..rest].copy_from_slice(&src[first..]);

        self.head = (self.head + samples.len()) & self.mask;
    }

    /// Up to `count` samples ending `delay` samples behind the head.
    ///
    /// Returns two contiguous pieces because the range may wrap around the end
    /// of the storage; the second is empty when it doesn't. Concatenated they
    /// are in chronological order. The total length is clamped so the range
    /// never reaches further back than the capacity.
    pub fn get_delayed(&self, count: usize, delay: usize) -> (&[f32], &[f32]) {
        let cap = self.data.len();
        let delay = delay.min(cap);
        let count = count.min(cap - delay);

        let start = (self.head + 2 * cap - delay - count) & self.mask;
        let first = (cap - start).min(count);
        (&self.data[start..start + first], &self.data[..count - first])
    }

    /// Copy `out.len()` samples ending `delay` behind the head into `out`.
    ///
    /// Convenience over [`get_delayed`](Self::get_delayed); returns how many
    /// samples were copied.
    pub fn read_delayed(&self, out: &mut [f32], delay: usize) -> usize {
        let (a, b) = self.get_delayed(out.len(), delay);
        out[..a.len()].copy_from_slice(a);
        out[a.len()..a.len() + b.len()].copy_from_slice(b);
        a.len() + b.len()
    }

    /// Zero the contents. Only used on stream (re)initialization.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.head = 0;
    }
}
