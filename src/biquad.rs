//! Second-order IIR sections.
//!
//! Coefficients follow the RBJ Audio EQ Cookbook, computed in `f64` and
//! stored normalized (`a0 = 1`) as `f32`. The feedback terms are stored
//! negated so the Direct-Form-I loop is a single sum of products:
//!
//! `y = b0·x0 + b1·x1 + b2·x2 + (-a1)·y1 + (-a2)·y2`

use core::f64::consts::TAU;

/// Lowest frequency at which an EQ band is considered active.
pub const MIN_BAND_FREQUENCY: f32 = 5.0;

const MIN_Q: f64 = 0.025;
const MAX_Q: f64 = 40.0;

/// Response shape of an EQ band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BandShape {
    /// Boost or cut around the center frequency
    #[default]
    Bell,
    /// Boost or cut below the corner frequency
    LowShelf,
    /// Boost or cut above the corner frequency
    HighShelf,
    /// Narrow rejection at the center frequency (gain is ignored)
    Notch,
}

/// Normalized biquad coefficients with negated feedback terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// `-a1 / a0`
    pub a1: f32,
    /// `-a2 / a0`
    pub a2: f32,
}

impl Coefficients {
    /// Pass-through section.
    pub const IDENTITY: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    /// Coefficients for one EQ band.
    pub fn band(shape: BandShape, frequency: f32, gain_db: f32, q: f32, sample_rate: u32) -> Self {
        let fs = sample_rate.max(1) as f64;
        let f0 = (frequency as f64).clamp(MIN_BAND_FREQUENCY as f64, fs * 0.499);
        let q = (q as f64).clamp(MIN_Q, MAX_Q);

        let a = 10.0_f64.powf(gain_db as f64 / 40.0);
        let w0 = TAU * f0 / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        match shape {
            BandShape::Bell => Self::normalize(
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            BandShape::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                Self::normalize(
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            BandShape::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                Self::normalize(
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            BandShape::Notch => Self::normalize(
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        }
    }

    /// Low-pass section, used for the resampler's anti-alias stages.
    ///
    /// `frequency` is clamped below Nyquist.
    pub fn low_pass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let f0 = frequency.clamp(1.0, sample_rate * 0.499);
        let w0 = TAU * f0 / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q.clamp(MIN_Q, MAX_Q));

        Self::normalize(
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (-a1 / a0) as f32,
            a2: (-a2 / a0) as f32,
        }
    }

    /// Magnitude response in dB at `frequency`.
    pub fn magnitude_db(&self, frequency: f32, sample_rate: u32) -> f32 {
        let w = TAU * frequency as f64 / sample_rate.max(1) as f64;
        let (b0, b1, b2) = (self.b0 as f64, self.b1 as f64, self.b2 as f64);
        // back to the conventional sign for the denominator
        let (a1, a2) = (-self.a1 as f64, -self.a2 as f64);

        let num_re = b0 + b1 * w.cos() + b2 * (2.0 * w).cos();
        let num_im = -(b1 * w.sin() + b2 * (2.0 * w).sin());
        let den_re = 1.0 + a1 * w.cos() + a2 * (2.0 * w).cos();
        let den_im = -(a1 * w.sin() + a2 * (2.0 * w).sin());

        let mag_sq = (num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im);
        (10.0 * mag_sq.max(1e-30).log10()) as f32
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direct-Form-I history for one channel of one section.
///
/// Persisted across `read` calls; only cleared when a stream is
/// (re)initialized.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct History {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl History {
    #[inline(always)]
    pub fn tick(&mut self, c: &Coefficients, x0: f32) -> f32 {
        let y0 = c.b0 * x0 + c.b1 * self.x1 + c.b2 * self.x2 + c.a1 * self.y1 + c.a2 * self.y2;
        let y0 = flush_denormal(y0);
        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;
        y0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[inline(always)]
pub(crate) fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-30 {
        0.0
    } else {
        x
    }
}
