//! Offline rendering across the config and infra crates

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use proptest::prelude::*;
use spatial_saturator_core::domain::config::PresetManager;
use spatial_saturator_core::domain::dsp::{SignalChain, SpatialSaturator};
use spatial_saturator_core::domain::params::{ParameterId, ParameterSnapshot, SharedParameters};
use spatial_saturator_infra::audio::{process_interleaved, read_stereo_wav, render_wav, write_float_wav};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn tone(frames: usize, sample_rate: u32) -> Vec<f32> {
    (0..frames)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let l = (2.0 * std::f32::consts::PI * 180.0 * t).sin() * 0.5;
            let r = (2.0 * std::f32::consts::PI * 2500.0 * t).sin() * 0.3;
            [l, r]
        })
        .collect()
}

fn write_int24_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * 8_388_607.0) as i32).unwrap();
    }
    writer.finalize().unwrap();
}

fn read_rendered(path: &Path) -> Vec<f32> {
    let mut reader = WavReader::open(path).unwrap();
    assert_eq!(reader.spec().sample_format, SampleFormat::Float);
    reader.samples::<f32>().map(|s| s.unwrap()).collect()
}

fn process_directly(samples: &mut [f32], sample_rate: u32, params: &ParameterSnapshot, block_frames: usize) {
    let mut chain = SignalChain::new(sample_rate as f64).unwrap();
    for block in samples.chunks_mut(block_frames * 2) {
        chain.process_block(block, params).unwrap();
    }
}

#[test]
fn test_render_int24_matches_chain() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_int24_wav(&input, 48000, &tone(5000, 48000));

    let params = ParameterSnapshot::factory_preset("wide").unwrap();
    let report = render_wav(&input, &output, &params, 256).unwrap();

    assert_eq!(report.sample_rate, 48000);
    assert_eq!(report.frames, 5000);
    assert_eq!(report.blocks, 20);

    let (_, mut expected) = read_stereo_wav(&input).unwrap();
    process_directly(&mut expected, 48000, &params, 256);

    assert_eq!(read_rendered(&output), expected);
}

#[test]
fn test_render_float_input_at_low_rate() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_float_wav(&input, 22050, &tone(2048, 22050)).unwrap();

    // Side cutoffs above Nyquist at this rate
    let mut params = ParameterSnapshot::default();
    params.side_freq_lower_hz = 15000.0;
    params.side_freq_upper_hz = 18000.0;

    let report = render_wav(&input, &output, &params, 100).unwrap();
    assert_eq!(report.frames, 2048);
    assert_eq!(report.blocks, 21);

    let rendered = read_rendered(&output);
    assert_eq!(rendered.len(), 4096);
    assert!(rendered.iter().all(|s| s.is_finite()));
}

#[tokio::test]
async fn test_saved_preset_drives_render() {
    let dir = TempDir::new().unwrap();
    let presets = PresetManager::new(dir.path().join("presets"));

    let mut params = ParameterSnapshot::factory_preset("subtle").unwrap();
    params.set(ParameterId::SideGainDb, 10.5);
    params.set(ParameterId::TanhSlope, 12.0);
    presets.save_preset("mastering", &params).await.unwrap();

    let loaded = presets.load_preset("mastering").await.unwrap();
    assert_eq!(loaded, params);

    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_float_wav(&input, 44100, &tone(1500, 44100)).unwrap();

    let (render_in, render_out) = (input.clone(), output.clone());
    let report = tokio::task::spawn_blocking(move || render_wav(&render_in, &render_out, &loaded, 512))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.blocks, 3);

    let (_, mut expected) = read_stereo_wav(&input).unwrap();
    process_directly(&mut expected, 44100, &params, 512);
    assert_eq!(read_rendered(&output), expected);
}

#[tokio::test]
async fn test_out_of_range_preset_file_is_clamped() {
    let dir = TempDir::new().unwrap();
    let presets = PresetManager::new(dir.path().to_path_buf());
    tokio::fs::write(
        presets.preset_path("hot"),
        "mid_gain_db = 40.0\nsaturator_mix = 0.0\n",
    )
    .await
    .unwrap();

    let loaded = presets.load_preset("hot").await.unwrap();
    assert_eq!(loaded.mid_gain_db, 12.0);
    assert_eq!(loaded.saturator_mix, 1.0);
    assert_eq!(loaded.side_gain_db, ParameterSnapshot::default().side_gain_db);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// With fixed parameters the output does not depend on how the stream is split
    #[test]
    fn prop_block_size_does_not_change_output(
        block_a in 1usize..700,
        block_b in 1usize..700,
    ) {
        let params = ParameterSnapshot::factory_preset("wide").unwrap();
        let input = tone(1500, 48000);

        let render = |block_frames: usize| {
            let shared = Arc::new(SharedParameters::new(&params));
            let mut effect = SpatialSaturator::new(48000.0, shared).unwrap();
            let mut samples = input.clone();
            process_interleaved(&mut samples, &mut effect, block_frames).unwrap();
            samples
        };

        prop_assert_eq!(render(block_a), render(block_b));
    }
}
