//! Integration tests for the complete signal chain
//!
//! These tests drive the chain the way a host does: interleaved blocks, one
//! parameter snapshot per block, and a control thread writing parameters
//! concurrently.

use spatial_saturator_core::domain::dsp::{
    ChainCoefficients, Effect, Result, SaturatorShape, SignalChain, SpatialSaturator,
};
use spatial_saturator_core::domain::params::{ParameterId, ParameterSnapshot, SharedParameters};
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const FS: f64 = 48000.0;

fn generate_stereo_sine(frames: usize, left_hz: f32, right_hz: f32, offset: usize) -> Vec<f32> {
    (offset..offset + frames)
        .flat_map(|i| {
            let t = i as f32 / FS as f32;
            [
                (2.0 * std::f32::consts::PI * left_hz * t).sin() * 0.6,
                (2.0 * std::f32::consts::PI * right_hz * t).sin() * 0.4,
            ]
        })
        .collect()
}

/// Clamp to a fixed ceiling; stands in for a limiter after the saturator
struct HardClip {
    ceiling: f32,
    bypassed: bool,
}

impl Effect for HardClip {
    fn process(&mut self, buffer: &mut [f32]) -> Result<()> {
        for sample in buffer.iter_mut() {
            *sample = sample.clamp(-self.ceiling, self.ceiling);
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
        "Hard Clip"
    }
}

// ============================================================================
// END-TO-END SCENARIO
// ============================================================================

#[test]
fn test_single_frame_step_response() {
    let mut params = ParameterSnapshot::default();
    params.mid_gain_db = 0.0;

    let mut chain = SignalChain::new(FS).unwrap();
    let mut buffer = vec![1.0f32, -1.0];
    chain.process_block(&mut buffer, &params).unwrap();

    // L=1, R=-1 encodes to mid=0, side=1. With zero state each biquad emits b0*x.
    let q = FRAC_1_SQRT_2;

    let w0 = 2.0 * PI * 140.0 / FS;
    let alpha = w0.sin() / (2.0 * q);
    let hp_b0 = ((1.0 + w0.cos()) / 2.0) / (1.0 + alpha);

    let a = 10.0_f64.powf(6.0 / 40.0);
    let w0 = 2.0 * PI * 4000.0 / FS;
    let (cos_w0, alpha) = (w0.cos(), w0.sin() / (2.0 * q));
    let shelf_b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)
        / ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha);

    let side = shelf_b0 * hp_b0;
    let saturate = |x: f64| (0.5 * (x * 7.0).tanh() + 0.5 * (x * 60.0).sin()) * 0.5;

    assert!((buffer[0] as f64 - saturate(side)).abs() < 1e-6);
    assert!((buffer[1] as f64 - saturate(-side)).abs() < 1e-6);

    // Mid stays silent, so L and R mirror each other
    assert!((buffer[0] + buffer[1]).abs() < 1e-6);
}

// ============================================================================
// SATURATOR COVERAGE
// ============================================================================

/// The waveshaper runs on every sample of both channels in every block.
///
/// This intentionally differs from a literal reading of the plugin this
/// effect descends from, whose saturation loop never executed.
#[test]
fn test_saturator_applies_to_every_sample() {
    let params = ParameterSnapshot::factory_preset("wide").unwrap();
    let shape = SaturatorShape::from_snapshot(&params);

    let mut saturated = SignalChain::new(FS).unwrap();
    let mut filtered_only = SignalChain::new(FS).unwrap();
    filtered_only.saturator_mut().set_bypass(true);

    for block in 0..4 {
        let input = generate_stereo_sine(128, 300.0, 700.0, block * 128);

        let mut wet = input.clone();
        let mut dry = input.clone();
        saturated.process_block(&mut wet, &params).unwrap();
        filtered_only.process_block(&mut dry, &params).unwrap();

        for (i, (w, d)) in wet.iter().zip(&dry).enumerate() {
            let expected = shape.apply(*d as f64);
            assert!(
                (*w as f64 - expected).abs() < 1e-4,
                "block {block}, sample {i}: {w} != {expected}"
            );
        }
    }
}

#[test]
fn test_output_bounded_by_saturator_amplitudes() {
    let mut params = ParameterSnapshot::default();
    params.make_up_gain_db = 12.0;
    params.side_gain_db = 12.0;
    params.tanh_amplitude = 80.0;
    params.sine_amplitude = 20.0;
    params.saturator_mix = 100.0;

    let mut chain = SignalChain::new(FS).unwrap();
    let mut buffer: Vec<f32> = generate_stereo_sine(4096, 60.0, 90.0, 0)
        .into_iter()
        .map(|s| s * 1.6)
        .collect();
    chain.process_block(&mut buffer, &params).unwrap();

    let bound = (80.0 + 20.0) * 0.01;
    assert!(buffer.iter().all(|s| (s.abs() as f64) <= bound + 1e-6));
}

// ============================================================================
// CONCURRENT PARAMETER UPDATES
// ============================================================================

#[test]
fn test_coefficients_stable_within_block_under_concurrent_writes() {
    let shared = Arc::new(SharedParameters::default());
    let mut effect = SpatialSaturator::new(FS, Arc::clone(&shared)).unwrap();
    let mut reference = SignalChain::new(FS).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let shared = Arc::clone(&shared);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut i = 0u32;
            while !stop.load(Ordering::Relaxed) {
                shared.set(ParameterId::MidFreqHz, 20.0 + (i % 980) as f32);
                shared.set(ParameterId::SideGainDb, (i % 25) as f32 * 0.5);
                shared.set(ParameterId::SideFreqLowerHz, 20.0 + (i % 2000) as f32);
                shared.set(ParameterId::MakeUpGainDb, (i % 49) as f32 * 0.5 - 12.0);
                i = i.wrapping_add(1);
            }
        })
    };

    for block in 0..200 {
        let input = generate_stereo_sine(64, 220.0, 330.0, block * 64);

        let mut output = input.clone();
        effect.process(&mut output).unwrap();
        let snapshot = *effect.last_snapshot();

        // Coefficients at block end are exactly those of the block's snapshot
        assert_eq!(
            effect.chain().coefficients(),
            ChainCoefficients::derive(&snapshot, FS)
        );

        // A chain fed that one snapshot reproduces the block sample for sample
        let mut expected = input;
        reference.process_block(&mut expected, &snapshot).unwrap();
        assert_eq!(output, expected, "block {block} mixed parameter values");
    }

    stop.store(true, Ordering::Relaxed);
    writer.join().unwrap();
}

#[test]
fn test_parameter_change_takes_effect_next_block() {
    let shared = Arc::new(SharedParameters::default());
    let mut effect = SpatialSaturator::new(FS, Arc::clone(&shared)).unwrap();

    let mut block = generate_stereo_sine(32, 440.0, 440.0, 0);
    effect.process(&mut block).unwrap();
    let before = effect.chain().coefficients();

    shared.set(ParameterId::MidGainDb, 10.0);
    assert_eq!(effect.chain().coefficients(), before);

    let mut block = generate_stereo_sine(32, 440.0, 440.0, 32);
    effect.process(&mut block).unwrap();
    assert_ne!(effect.chain().coefficients().mid_shelf, before.mid_shelf);
    assert_eq!(effect.chain().coefficients().side_shelf, before.side_shelf);
}

// ============================================================================
// HOST LIFECYCLE
// ============================================================================

#[test]
fn test_output_stage_limits_after_saturation() {
    let shared = Arc::new(SharedParameters::new(
        &ParameterSnapshot::factory_preset("wide").unwrap(),
    ));
    shared.set(ParameterId::MakeUpGainDb, 12.0);
    shared.set(ParameterId::SaturatorMix, 100.0);
    shared.set(ParameterId::TanhAmplitude, 100.0);

    let mut effect = SpatialSaturator::new(FS, shared).unwrap();
    effect.chain_mut().set_output_stage(Some(Box::new(HardClip {
        ceiling: 0.25,
        bypassed: false,
    })));

    let mut buffer = generate_stereo_sine(512, 100.0, 150.0, 0);
    effect.process(&mut buffer).unwrap();

    assert!(buffer.iter().all(|s| s.abs() <= 0.25));
    assert!(buffer.iter().any(|s| s.abs() == 0.25));

    let previous = effect.chain_mut().set_output_stage(None);
    assert_eq!(previous.map(|s| s.name().to_string()), Some("Hard Clip".to_string()));
}

#[test]
fn test_prepare_rederives_for_new_sample_rate() {
    let params = ParameterSnapshot::default();
    let mut chain = SignalChain::new(44100.0).unwrap();
    let mut buffer = generate_stereo_sine(64, 200.0, 300.0, 0);
    chain.process_block(&mut buffer, &params).unwrap();

    chain.prepare(96000.0).unwrap();
    assert_eq!(chain.sample_rate(), 96000.0);
    assert_eq!(chain.coefficients(), ChainCoefficients::derive(&params, 96000.0));
}

#[test]
fn test_high_cutoff_at_low_sample_rate_stays_finite() {
    // 20 kHz side high-pass at 22.05 kHz is above Nyquist and gets clamped
    let mut params = ParameterSnapshot::default();
    params.side_freq_lower_hz = 20000.0;
    params.side_freq_upper_hz = 20000.0;

    let mut chain = SignalChain::new(22050.0).unwrap();
    let coeffs = ChainCoefficients::derive(&params, 22050.0);
    assert!(coeffs.side_high_pass.is_stable());
    assert!(coeffs.side_shelf.is_stable());

    for block in 0..50 {
        let mut buffer = generate_stereo_sine(256, 1000.0, 50.0, block * 256);
        chain.process_block(&mut buffer, &params).unwrap();
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
