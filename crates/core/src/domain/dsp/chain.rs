//! Per-block orchestration of the mid/side signal path

use super::biquad::FilterCoefficients;
use super::filters::{HighPassFilter, ShelvingFilter};
use super::mid_side::{db_to_gain, MidSideCodec};
use super::saturator::{Saturator, SaturatorShape};
use super::{check_interleaved, Effect, Result};
use crate::domain::audio::AudioError;
use crate::domain::params::{ParameterSnapshot, SharedParameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Frames per chunk when a planar block is handed to the output stage
const PLANAR_CHUNK_FRAMES: usize = 64;

/// Coefficients of the three filters as used by the latest block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainCoefficients {
    pub mid_shelf: FilterCoefficients,
    pub side_high_pass: FilterCoefficients,
    pub side_shelf: FilterCoefficients,
}

impl ChainCoefficients {
    /// Coefficients a chain would derive from `params` at `sample_rate`
    pub fn derive(params: &ParameterSnapshot, sample_rate: f64) -> Self {
        let p = params.clamped();
        Self {
            mid_shelf: FilterCoefficients::low_shelf(
                sample_rate,
                p.mid_freq_hz as f64,
                p.mid_gain_db as f64,
            ),
            side_high_pass: FilterCoefficients::high_pass(sample_rate, p.side_freq_lower_hz as f64),
            side_shelf: FilterCoefficients::low_shelf(
                sample_rate,
                p.side_freq_upper_hz as f64,
                p.side_gain_db as f64,
            ),
        }
    }
}

fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(AudioError::InvalidConfiguration(format!(
            "sample rate must be positive and finite, got {sample_rate}"
        )));
    }
    Ok(())
}

/// The full signal path
///
/// `encode -> mid shelf -> side high-pass -> side shelf -> decode -> saturate
/// -> output stage`. Parameters are applied once at the start of each block;
/// filter state carries over between blocks.
pub struct SignalChain {
    sample_rate: f64,
    mid_shelf: ShelvingFilter,
    side_high_pass: HighPassFilter,
    side_shelf: ShelvingFilter,
    saturator: Saturator,
    output_stage: Option<Box<dyn Effect>>,
}

impl fmt::Debug for SignalChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalChain")
            .field("sample_rate", &self.sample_rate)
            .field("mid_shelf", &self.mid_shelf)
            .field("side_high_pass", &self.side_high_pass)
            .field("side_shelf", &self.side_shelf)
            .field("saturator", &self.saturator)
            .field("output_stage", &self.output_stage.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl SignalChain {
    /// Build a chain at `sample_rate` with default parameters
    pub fn new(sample_rate: f64) -> Result<Self> {
        validate_sample_rate(sample_rate)?;

        let p = ParameterSnapshot::default();
        let chain = Self {
            sample_rate,
            mid_shelf: ShelvingFilter::new(sample_rate, p.mid_freq_hz as f64, p.mid_gain_db as f64),
            side_high_pass: HighPassFilter::new(sample_rate, p.side_freq_lower_hz as f64),
            side_shelf: ShelvingFilter::new(
                sample_rate,
                p.side_freq_upper_hz as f64,
                p.side_gain_db as f64,
            ),
            saturator: Saturator::new(SaturatorShape::from_snapshot(&p)),
            output_stage: None,
        };

        info!("Signal chain created at {} Hz", sample_rate);
        Ok(chain)
    }

    /// Switch to a new sample rate on stream (re)start
    ///
    /// Coefficients are rederived; filter state is kept.
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        validate_sample_rate(sample_rate)?;

        self.sample_rate = sample_rate;
        self.mid_shelf.set_sample_rate(sample_rate);
        self.side_high_pass.set_sample_rate(sample_rate);
        self.side_shelf.set_sample_rate(sample_rate);

        info!("Signal chain prepared at {} Hz", sample_rate);
        debug!("Chain coefficients: {:?}", self.coefficients());
        Ok(())
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Install an effect after the saturator, replacing any previous one
    pub fn set_output_stage(&mut self, stage: Option<Box<dyn Effect>>) -> Option<Box<dyn Effect>> {
        std::mem::replace(&mut self.output_stage, stage)
    }

    pub fn output_stage(&self) -> Option<&dyn Effect> {
        self.output_stage.as_deref()
    }

    pub fn saturator(&self) -> &Saturator {
        &self.saturator
    }

    pub fn saturator_mut(&mut self) -> &mut Saturator {
        &mut self.saturator
    }

    pub fn coefficients(&self) -> ChainCoefficients {
        ChainCoefficients {
            mid_shelf: *self.mid_shelf.coefficients(),
            side_high_pass: *self.side_high_pass.coefficients(),
            side_shelf: *self.side_shelf.coefficients(),
        }
    }

    /// Clear all filter state and the output stage
    pub fn reset(&mut self) {
        self.mid_shelf.reset();
        self.side_high_pass.reset();
        self.side_shelf.reset();
        if let Some(stage) = self.output_stage.as_mut() {
            stage.reset();
        }
    }

    fn apply_parameters(&mut self, params: &ParameterSnapshot) -> f64 {
        let p = params.clamped();
        self.mid_shelf.update(p.mid_freq_hz as f64, p.mid_gain_db as f64);
        self.side_high_pass.update(p.side_freq_lower_hz as f64);
        self.side_shelf.update(p.side_freq_upper_hz as f64, p.side_gain_db as f64);
        self.saturator.set_shape(SaturatorShape::from_snapshot(&p));
        db_to_gain(p.make_up_gain_db as f64)
    }

    #[inline]
    fn process_frame(&mut self, left: f64, right: f64, gain: f64, saturate: bool) -> (f64, f64) {
        let (mid, side) = MidSideCodec::encode(left, right);

        let mid = self.mid_shelf.process(mid);
        let side = self.side_high_pass.process(side);
        let side = self.side_shelf.process(side);

        let (left, right) = MidSideCodec::decode_linear(mid, side, gain);

        if saturate {
            (
                self.saturator.process_sample(left),
                self.saturator.process_sample(right),
            )
        } else {
            (left, right)
        }
    }

    /// Process one interleaved stereo block in-place
    pub fn process_block(&mut self, buffer: &mut [f32], params: &ParameterSnapshot) -> Result<()> {
        let frames = check_interleaved(buffer)?;
        if frames == 0 {
            return Ok(());
        }

        let gain = self.apply_parameters(params);
        let saturate = !self.saturator.is_bypassed();

        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = self.process_frame(frame[0] as f64, frame[1] as f64, gain, saturate);
            frame[0] = left as f32;
            frame[1] = right as f32;
        }

        if let Some(stage) = self.output_stage.as_mut() {
            if !stage.is_bypassed() {
                stage.process(buffer)?;
            }
        }

        Ok(())
    }

    /// Process split left/right buffers in-place
    pub fn process_planar(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        params: &ParameterSnapshot,
    ) -> Result<()> {
        if left.len() != right.len() {
            return Err(AudioError::InvalidConfiguration(format!(
                "planar channel lengths differ: {} vs {}",
                left.len(),
                right.len()
            )));
        }
        if left.is_empty() {
            return Ok(());
        }

        let gain = self.apply_parameters(params);
        let saturate = !self.saturator.is_bypassed();

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process_frame(*l as f64, *r as f64, gain, saturate);
            *l = out_l as f32;
            *r = out_r as f32;
        }

        if let Some(stage) = self.output_stage.as_mut() {
            if !stage.is_bypassed() {
                let mut scratch = [0.0f32; PLANAR_CHUNK_FRAMES * 2];
                for (l_chunk, r_chunk) in left
                    .chunks_mut(PLANAR_CHUNK_FRAMES)
                    .zip(right.chunks_mut(PLANAR_CHUNK_FRAMES))
                {
                    let interleaved = &mut scratch[..l_chunk.len() * 2];
                    for (i, frame) in interleaved.chunks_exact_mut(2).enumerate() {
                        frame[0] = l_chunk[i];
                        frame[1] = r_chunk[i];
                    }
                    stage.process(interleaved)?;
                    for (i, frame) in interleaved.chunks_exact(2).enumerate() {
                        l_chunk[i] = frame[0];
                        r_chunk[i] = frame[1];
                    }
                }
            }
        }

        Ok(())
    }
}

/// Host-facing processor reading parameters from a shared store
///
/// Takes exactly one snapshot per block, so a concurrent writer can never
/// change coefficients partway through a block.
#[derive(Debug)]
pub struct SpatialSaturator {
    chain: SignalChain,
    params: Arc<SharedParameters>,
    last_snapshot: ParameterSnapshot,
    bypassed: bool,
}

impl SpatialSaturator {
    pub fn new(sample_rate: f64, params: Arc<SharedParameters>) -> Result<Self> {
        let chain = SignalChain::new(sample_rate)?;
        let last_snapshot = params.snapshot();
        Ok(Self {
            chain,
            params,
            last_snapshot,
            bypassed: false,
        })
    }

    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        self.chain.prepare(sample_rate)
    }

    pub fn parameters(&self) -> &Arc<SharedParameters> {
        &self.params
    }

    /// Snapshot applied to the most recent block
    pub fn last_snapshot(&self) -> &ParameterSnapshot {
        &self.last_snapshot
    }

    pub fn chain(&self) -> &SignalChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut SignalChain {
        &mut self.chain
    }
}

impl Effect for SpatialSaturator {
    fn process(&mut self, buffer: &mut [f32]) -> Result<()> {
        check_interleaved(buffer)?;
        if self.bypassed || buffer.is_empty() {
            return Ok(());
        }

        self.last_snapshot = self.params.snapshot();
        self.chain.process_block(buffer, &self.last_snapshot)
    }

    fn reset(&mut self) {
        self.chain.reset();
    }

    fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    fn name(&self) -> &str {
        "Spatial Saturator"
    }
}
