//! Shelving and high-pass filters built on [`BiquadStage`]
//!
//! Each filter owns its coefficients and state outright. Coefficients are
//! derived with the RBJ cookbook formulas and recomputed once per block.

use super::biquad::{BiquadStage, FilterCoefficients, FilterState};
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use tracing::trace;

/// Fixed quality factor used by every filter in the chain
pub const Q_BUTTERWORTH: f64 = FRAC_1_SQRT_2;

/// Lowest cutoff accepted before derivation
pub const MIN_CUTOFF_HZ: f64 = 1.0;

/// Highest cutoff as a fraction of the sample rate
pub const NYQUIST_GUARD: f64 = 0.49;

/// Clamp a cutoff into `[MIN_CUTOFF_HZ, NYQUIST_GUARD * sample_rate]`
///
/// Cutoffs at or above Nyquist give unstable coefficients; NaN maps to the
/// lower bound.
pub fn clamp_cutoff(freq: f64, sample_rate: f64) -> f64 {
    let upper = (NYQUIST_GUARD * sample_rate).max(MIN_CUTOFF_HZ);
    if freq.is_nan() {
        return MIN_CUTOFF_HZ;
    }
    freq.clamp(MIN_CUTOFF_HZ, upper)
}

impl FilterCoefficients {
    /// Calculate coefficients for a low shelf filter
    ///
    /// Boosts or cuts frequencies below the corner frequency.
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Corner frequency in Hz (clamped below Nyquist)
    /// - `gain_db`: Shelf gain in decibels, 0 dB collapses to identity
    #[must_use]
    pub fn low_shelf(sample_rate: f64, freq: f64, gain_db: f64) -> Self {
        let freq = clamp_cutoff(freq, sample_rate);
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * Q_BUTTERWORTH);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate coefficients for a second-order high-pass filter
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64) -> Self {
        let freq = clamp_cutoff(freq, sample_rate);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * Q_BUTTERWORTH);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }
}

// ============================================================================
// SHELVING FILTER
// ============================================================================

/// Low shelf with its own coefficients and state
#[derive(Debug, Clone)]
pub struct ShelvingFilter {
    sample_rate: f64,
    freq: f64,
    gain_db: f64,
    stage: BiquadStage,
}

impl ShelvingFilter {
    pub fn new(sample_rate: f64, freq: f64, gain_db: f64) -> Self {
        Self {
            sample_rate,
            freq,
            gain_db,
            stage: BiquadStage::new(FilterCoefficients::low_shelf(sample_rate, freq, gain_db)),
        }
    }

    /// Recompute coefficients from the current block's parameters
    ///
    /// State is kept; unchanged parameters skip the derivation.
    pub fn update(&mut self, freq: f64, gain_db: f64) {
        if freq == self.freq && gain_db == self.gain_db {
            return;
        }
        self.freq = freq;
        self.gain_db = gain_db;
        self.recompute();
    }

    /// Change the sample rate, rederiving coefficients
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.recompute();
    }

    fn recompute(&mut self) {
        let coeffs = FilterCoefficients::low_shelf(self.sample_rate, self.freq, self.gain_db);
        self.stage.set_coefficients(coeffs);

        trace!(
            "Low shelf updated: freq={:.1}Hz gain={:.1}dB fs={}",
            self.freq,
            self.gain_db,
            self.sample_rate
        );
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        self.stage.process(x)
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        self.stage.coefficients()
    }

    pub fn state(&self) -> &FilterState {
        self.stage.state()
    }

    pub fn reset(&mut self) {
        self.stage.reset();
    }
}

// ============================================================================
// HIGH-PASS FILTER
// ============================================================================

/// Second-order high-pass, Q fixed at 1/sqrt(2)
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    sample_rate: f64,
    freq: f64,
    stage: BiquadStage,
}

impl HighPassFilter {
    pub fn new(sample_rate: f64, freq: f64) -> Self {
        Self {
            sample_rate,
            freq,
            stage: BiquadStage::new(FilterCoefficients::high_pass(sample_rate, freq)),
        }
    }

    pub fn update(&mut self, freq: f64) {
        if freq == self.freq {
            return;
        }
        self.freq = freq;
        self.recompute();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.stage
            .set_coefficients(FilterCoefficients::high_pass(self.sample_rate, self.freq));
        trace!("High-pass updated: freq={:.1}Hz fs={}", self.freq, self.sample_rate);
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        self.stage.process(x)
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        self.stage.coefficients()
    }

    pub fn state(&self) -> &FilterState {
        self.stage.state()
    }

    pub fn reset(&mut self) {
        self.stage.reset();
    }
}
