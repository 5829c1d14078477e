//! Second-order IIR section used by every filter in the chain

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// State magnitudes below this are flushed to zero
pub const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Replace values in or near the subnormal range with zero
#[inline(always)]
pub fn flush_denormal(x: f64) -> f64 {
    if x.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        x
    }
}

/// Biquad filter coefficients
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2),
/// stored already divided by a0 so `a0` is always 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for FilterCoefficients {
    fn default() -> Self {
        Self::identity()
    }
}

impl FilterCoefficients {
    /// Unity gain, no filtering
    pub const fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Build from raw cookbook terms, dividing everything by `a0`
    #[must_use]
    pub fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv_a0 = 1.0 / a0;
        Self {
            b0: b0 * inv_a0,
            b1: b1 * inv_a0,
            b2: b2 * inv_a0,
            a0: 1.0,
            a1: a1 * inv_a0,
            a2: a2 * inv_a0,
        }
    }

    /// Poles strictly inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Magnitude of the frequency response |H(e^jw)| at `freq` Hz
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = self.b0 + z1 * self.b1 + z2 * self.b2;
        let denominator = self.a0 + z1 * self.a1 + z2 * self.a2;

        (numerator / denominator).norm()
    }

    /// Magnitude response in dB at `freq` Hz
    pub fn magnitude_db_at(&self, freq: f64, sample_rate: f64) -> f64 {
        20.0 * self.magnitude_at(freq, sample_rate).max(1e-12).log10()
    }
}

/// Internal memory of one second-order section
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub z1: f64,
    pub z2: f64,
}

impl FilterState {
    pub fn is_zero(&self) -> bool {
        self.z1 == 0.0 && self.z2 == 0.0
    }
}

/// Stateful biquad using Transposed Direct Form II
///
/// Processes one channel, one sample at a time, in sample order. The state
/// belongs to this stage alone and is carried across blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiquadStage {
    coeffs: FilterCoefficients,
    state: FilterState,
}

impl BiquadStage {
    /// Create a stage with zeroed state
    pub fn new(coeffs: FilterCoefficients) -> Self {
        Self {
            coeffs,
            state: FilterState::default(),
        }
    }

    /// Swap coefficients, keeping the recursive state
    pub fn set_coefficients(&mut self, coeffs: FilterCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.state.z1;
        // Decaying state must not settle in the subnormal range during silence
        self.state.z1 = flush_denormal(self.state.z2 + c.b1 * x - c.a1 * y);
        self.state.z2 = flush_denormal(c.b2 * x - c.a2 * y);
        y
    }

    /// Process a mono buffer in-place
    pub fn process_slice(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample as f64) as f32;
        }
    }

    /// Clear the recursive state
    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}
