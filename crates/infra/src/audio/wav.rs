//! Offline rendering of stereo WAV files through the signal chain

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use spatial_saturator_core::domain::audio::{AudioError, ChannelCount};
use spatial_saturator_core::domain::dsp::{Effect, SpatialSaturator};
use spatial_saturator_core::domain::params::{ParameterSnapshot, SharedParameters};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors from reading, processing or writing a WAV file
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Summary of one offline render
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderReport {
    pub sample_rate: u32,
    pub frames: usize,
    pub blocks: usize,
    pub input_peak: f32,
    pub output_peak: f32,
}

/// Read a stereo WAV file as interleaved f32 in [-1.0, 1.0]
///
/// Returns the sample rate alongside the samples.
pub fn read_stereo_wav(path: &Path) -> Result<(u32, Vec<f32>)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    ChannelCount::from_count(spec.channels).require_stereo()?;

    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "Reading WAV"
    );

    let mut samples = read_samples_as_f32(reader, spec)?;
    if samples.len() % 2 != 0 {
        warn!("WAV ends with a partial frame, dropping last sample");
        samples.pop();
    }

    Ok((spec.sample_rate, samples))
}

fn read_samples_as_f32<R: std::io::Read>(mut reader: WavReader<R>, spec: WavSpec) -> Result<Vec<f32>> {
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<std::result::Result<Vec<f32>, _>>()?,
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v as f64 / 2_147_483_648.0) as f32))
            .collect::<std::result::Result<Vec<f32>, _>>()?,
        (format, bits) => {
            return Err(RenderError::UnsupportedFormat(format!(
                "{bits}-bit {format:?} samples"
            )))
        }
    };
    Ok(samples)
}

/// Write interleaved stereo samples as a 32-bit float WAV
pub fn write_float_wav(path: &Path, sample_rate: u32, samples: &[f32]) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    debug!(path = %path.display(), samples = samples.len(), "WAV written");
    Ok(())
}

/// Run an effect over interleaved stereo samples in blocks of `block_frames`
///
/// Returns the number of blocks processed.
pub fn process_interleaved(
    samples: &mut [f32],
    effect: &mut dyn Effect,
    block_frames: usize,
) -> Result<usize> {
    if block_frames == 0 {
        return Err(AudioError::InvalidConfiguration("block size must be positive".to_string()).into());
    }

    let mut blocks = 0;
    for block in samples.chunks_mut(block_frames * 2) {
        effect.process(block)?;
        blocks += 1;
    }
    Ok(blocks)
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Render `input` through the spatial saturator into `output`
///
/// The chain runs at the file's sample rate; the output is 32-bit float at
/// the same rate.
pub fn render_wav(
    input: &Path,
    output: &Path,
    parameters: &ParameterSnapshot,
    block_frames: usize,
) -> Result<RenderReport> {
    let (sample_rate, mut samples) = read_stereo_wav(input)?;
    let input_peak = peak(&samples);

    let shared = Arc::new(SharedParameters::new(parameters));
    let mut effect = SpatialSaturator::new(sample_rate as f64, shared)?;

    info!(
        input = %input.display(),
        sample_rate,
        frames = samples.len() / 2,
        block_frames,
        "Rendering"
    );

    let blocks = process_interleaved(&mut samples, &mut effect, block_frames)?;
    let output_peak = peak(&samples);

    write_float_wav(output, sample_rate, &samples)?;

    let report = RenderReport {
        sample_rate,
        frames: samples.len() / 2,
        blocks,
        input_peak,
        output_peak,
    };
    info!(output = %output.display(), ?report, "Render complete");
    Ok(report)
}
