//! Tanh + sine waveshaping saturator

use super::{check_interleaved, Effect, Result};
use crate::domain::params::ParameterSnapshot;
use serde::{Deserialize, Serialize};

/// Shape of the saturation curve, in the host's 0-100 parameter units
///
/// `y = A*0.01*tanh(x*k) + B*0.01*sin(x*f)`, then `out = y * mix*0.01`.
/// The mix scales the wet signal only; there is no dry blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturatorShape {
    pub tanh_amplitude: f64,
    pub tanh_slope: f64,
    pub sine_amplitude: f64,
    pub sine_frequency: f64,
    pub mix: f64,
}

impl Default for SaturatorShape {
    fn default() -> Self {
        Self::from_snapshot(&ParameterSnapshot::default())
    }
}

impl SaturatorShape {
    pub fn from_snapshot(params: &ParameterSnapshot) -> Self {
        Self {
            tanh_amplitude: params.tanh_amplitude as f64,
            tanh_slope: params.tanh_slope as f64,
            sine_amplitude: params.sine_amplitude as f64,
            sine_frequency: params.sine_frequency as f64,
            mix: params.saturator_mix as f64,
        }
    }

    /// Shape one sample
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        let tanh_part = self.tanh_amplitude * 0.01 * (x * self.tanh_slope).tanh();
        let sine_part = self.sine_amplitude * 0.01 * (x * self.sine_frequency).sin();
        (tanh_part + sine_part) * self.mix * 0.01
    }

    /// Upper bound on `|apply(x)|` for any finite `x`
    pub fn peak_bound(&self) -> f64 {
        (self.tanh_amplitude.abs() + self.sine_amplitude.abs()) * 0.01 * self.mix.abs() * 0.01
    }
}

/// Stateless saturator stage
///
/// Applied to every sample of both channels.
#[derive(Debug, Clone, Default)]
pub struct Saturator {
    shape: SaturatorShape,
    bypassed: bool,
}

impl Saturator {
    pub fn new(shape: SaturatorShape) -> Self {
        Self {
            shape,
            bypassed: false,
        }
    }

    pub fn set_shape(&mut self, shape: SaturatorShape) {
        self.shape = shape;
    }

    pub fn shape(&self) -> &SaturatorShape {
        &self.shape
    }

    #[inline]
    pub fn process_sample(&self, x: f64) -> f64 {
        self.shape.apply(x)
    }
}

impl Effect for Saturator {
    fn process(&mut self, buffer: &mut [f32]) -> Result<()> {
        check_interleaved(buffer)?;
        if self.bypassed {
            return Ok(());
        }

        for sample in buffer.iter_mut() {
            *sample = self.shape.apply(*sample as f64) as f32;
        }

        Ok(())
    }

    fn reset(&mut self) {}

    fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    fn name(&self) -> &str {
        "Saturator"
    }
}
