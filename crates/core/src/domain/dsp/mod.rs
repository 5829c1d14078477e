//! Digital Signal Processing for the spatial saturator
//!
//! The signal path, in processing order:
//! - Mid/side encoding of the stereo input
//! - Low shelf on the mid channel
//! - High-pass then low shelf on the side channel
//! - Mid/side decoding with make-up gain
//! - Tanh + sine waveshaping saturator
//! - Optional output stage (reserved for a limiter)
//!
//! All processors are designed for:
//! - Zero allocations in the hot path
//! - State owned by exactly one filter instance
//! - Coefficients recomputed at most once per block

mod biquad;
mod chain;
mod filters;
mod mid_side;
mod saturator;

pub use biquad::{BiquadStage, FilterCoefficients, FilterState};
pub use chain::{ChainCoefficients, SignalChain, SpatialSaturator};
pub use filters::{clamp_cutoff, HighPassFilter, ShelvingFilter, MIN_CUTOFF_HZ, NYQUIST_GUARD, Q_BUTTERWORTH};
pub use mid_side::{db_to_gain, MidSideCodec};
pub use saturator::{Saturator, SaturatorShape};

use crate::domain::audio::AudioError;

pub type Result<T> = std::result::Result<T, AudioError>;

/// Core trait for block-level audio processors
///
/// All effects process interleaved stereo `[L0, R0, L1, R1, ...]` in-place
/// on f32 buffers.
pub trait Effect: Send {
    /// Process a buffer of interleaved stereo samples in-place
    ///
    /// # Requirements
    /// - No allocations in the hot path
    /// - A zero-length buffer is a no-op
    fn process(&mut self, buffer: &mut [f32]) -> Result<()>;

    /// Reset recursive state to initial conditions
    ///
    /// Only called on explicit host request, never as a side effect of a
    /// parameter change.
    fn reset(&mut self);

    /// Check if effect is bypassed (buffer left untouched when true)
    fn is_bypassed(&self) -> bool;

    /// Toggle bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Get effect name for debugging/display
    fn name(&self) -> &str;
}

/// Reject interleaved buffers that do not hold whole stereo frames
pub(crate) fn check_interleaved(buffer: &[f32]) -> Result<usize> {
    if buffer.len() % 2 != 0 {
        return Err(AudioError::InvalidConfiguration(format!(
            "interleaved stereo buffer has odd length {}",
            buffer.len()
        )));
    }
    Ok(buffer.len() / 2)
}
