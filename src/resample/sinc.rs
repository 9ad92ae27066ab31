//! Oversampled windowed-sinc low-pass table

use alloc::vec::Vec;
use core::f64::consts::PI;

/// A low-pass kernel sampled at `oversampling` points per input frame.
///
/// The kernel spans `[-half_length, half_length]` input frames and is
/// windowed with a 4-term Blackman-Harris window. Lookups between table
/// points are linearly interpolated.
pub struct SincTable {
    half_length: usize,
    oversampling: usize,
    table: Vec<f32>,
}

impl SincTable {
    /// Build a table for a kernel of `2 * half_length` taps.
    ///
    /// `cutoff` is relative to the input Nyquist frequency (1.0 = no band
    /// limiting beyond the input's own).
    pub fn new(half_length: usize, oversampling: usize, cutoff: f64) -> Self {
        let half_length = half_length.max(1);
        let oversampling = oversampling.max(1);
        let cutoff = cutoff.clamp(0.01, 1.0);
        let len = 2 * half_length * oversampling + 1;

        let table = (0..len)
            .map(|k| {
                let x = k as f64 / oversampling as f64 - half_length as f64;
                let w = blackman_harris((x + half_length as f64) / (2 * half_length) as f64);
                (cutoff * sinc(cutoff * x) * w) as f32
            })
            .collect();

        Self { half_length, oversampling, table }
    }

    #[inline]
    pub fn half_length(&self) -> usize {
        self.half_length
    }

    /// Kernel value at `x` input frames from the center.
    #[inline]
    pub fn eval(&self, x: f64) -> f32 {
        let pos = (x + self.half_length as f64) * self.oversampling as f64;
        if pos <= 0.0 {
            return self.table[0];
        }
        let idx = pos as usize;
        if idx + 1 >= self.table.len() {
            return self.table[self.table.len() - 1];
        }
        let frac = (pos - idx as f64) as f32;
        let a = self.table[idx];
        let b = self.table[idx + 1];
        a + (b - a) * frac
    }
}

#[inline]
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// 4-term Blackman-Harris window, `n` in `[0, 1]`.
#[inline]
fn blackman_harris(n: f64) -> f64 {
    let t = 2.0 * PI * n;
    0.35875 - 0.48829 * t.cos() + 0.14128 * (2.0 * t).cos() - 0.01168 * (3.0 * t).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_band_kernel_is_interpolating() {
        let table = SincTable::new(8, 32, 1.0);
        assert!((table.eval(0.0) - 1.0).abs() < 1e-4);
        for j in 1..8 {
            assert!(table.eval(j as f64).abs() < 1e-4);
            assert!(table.eval(-(j as f64)).abs() < 1e-4);
        }
    }

    #[test]
    fn edges_are_windowed_to_zero() {
        let table = SincTable::new(8, 32, 0.8);
        assert!(table.eval(8.0).abs() < 1e-5);
        assert!(table.eval(-8.0).abs() < 1e-5);
        assert!(table.eval(100.0).abs() < 1e-5);
    }
}
