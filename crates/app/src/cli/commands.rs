//! Subcommand handlers

use anyhow::{Context as _, Result};
use serde_json::json;
use spatial_saturator_core::domain::config::{
    apply_assignments, ConfigManager, PresetManager, SpatialSaturatorConfig,
};
use spatial_saturator_core::domain::dsp::ChainCoefficients;
use spatial_saturator_core::domain::params::{ParameterId, ParameterSnapshot, FACTORY_PRESETS};
use spatial_saturator_infra::audio::render_wav;
use std::path::{Path, PathBuf};
use tracing::info;

/// Frequencies probed by `response`
const RESPONSE_FREQUENCIES: [f64; 12] = [
    20.0, 50.0, 100.0, 140.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 12000.0, 20000.0,
];

/// Loaded configuration and where presets live
pub struct Context {
    pub config: SpatialSaturatorConfig,
    pub presets: PresetManager,
}

impl Context {
    pub async fn load(config_path: Option<&Path>, preset_dir: Option<PathBuf>) -> Result<Self> {
        let (config, base_dir) = match config_path {
            Some(path) => {
                let config = SpatialSaturatorConfig::load_from_file(path)
                    .await
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                (config, base)
            }
            None => {
                let dir = ConfigManager::default_config_dir()?;
                let config = ConfigManager::new(dir.clone()).load().await;
                (config, dir)
            }
        };

        // Relative preset directories are resolved against the config location
        let preset_dir = preset_dir.unwrap_or_else(|| {
            if config.app.preset_dir.is_absolute() {
                config.app.preset_dir.clone()
            } else {
                base_dir.join(&config.app.preset_dir)
            }
        });

        Ok(Self {
            config,
            presets: PresetManager::new(preset_dir),
        })
    }

    /// Configured parameters, then the preset, then `--set` overrides
    pub async fn parameters(&self, preset: Option<&str>, set: &[String]) -> Result<ParameterSnapshot> {
        let mut parameters = match preset {
            Some(name) => self
                .presets
                .load_preset(name)
                .await
                .with_context(|| format!("failed to load preset '{name}'"))?,
            None => self.config.parameters,
        };
        apply_assignments(&mut parameters, set)?;
        Ok(parameters)
    }
}

pub async fn process(
    ctx: &Context,
    input: PathBuf,
    output: PathBuf,
    preset: Option<&str>,
    block_size: Option<usize>,
    set: &[String],
    json: bool,
) -> Result<()> {
    let parameters = ctx.parameters(preset, set).await?;
    let block_size = block_size.unwrap_or(ctx.config.app.buffer_size as usize);

    let report = tokio::task::spawn_blocking(move || {
        render_wav(&input, &output, &parameters, block_size)
            .with_context(|| format!("failed to render {}", input.display()))
    })
    .await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Rendered {} frames at {} Hz in {} blocks (peak {:.3} -> {:.3})",
            report.frames, report.sample_rate, report.blocks, report.input_peak, report.output_peak
        );
    }
    Ok(())
}

pub fn params(as_json: bool) -> Result<()> {
    if as_json {
        let rows: Vec<_> = ParameterId::ALL
            .into_iter()
            .map(|id| {
                let range = id.range();
                json!({
                    "key": id.key(),
                    "label": id.label(),
                    "unit": id.unit(),
                    "min": range.min,
                    "max": range.max,
                    "step": range.step,
                    "default": range.default,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<20} {:<22} {:>9} {:>9} {:>6} {:>9}",
        "KEY", "LABEL", "MIN", "MAX", "STEP", "DEFAULT"
    );
    for id in ParameterId::ALL {
        let range = id.range();
        println!(
            "{:<20} {:<22} {:>9} {:>9} {:>6} {:>9} {}",
            id.key(),
            id.label(),
            range.min,
            range.max,
            range.step,
            range.default,
            id.unit()
        );
    }
    Ok(())
}

pub async fn response(
    ctx: &Context,
    sample_rate: Option<u32>,
    preset: Option<&str>,
    set: &[String],
) -> Result<()> {
    let parameters = ctx.parameters(preset, set).await?;
    let sample_rate = sample_rate.unwrap_or(ctx.config.app.sample_rate);
    anyhow::ensure!(sample_rate > 0, "sample rate must be positive");

    let fs = sample_rate as f64;
    let coeffs = ChainCoefficients::derive(&parameters, fs);

    println!("Magnitude response at {} Hz (dB)", sample_rate);
    println!("{:>8} {:>11} {:>11} {:>11}", "FREQ", "MID SHELF", "SIDE HPF", "SIDE SHELF");
    for freq in RESPONSE_FREQUENCIES.into_iter().filter(|f| *f < fs / 2.0) {
        println!(
            "{:>8} {:>11.2} {:>11.2} {:>11.2}",
            freq,
            coeffs.mid_shelf.magnitude_db_at(freq, fs),
            coeffs.side_high_pass.magnitude_db_at(freq, fs),
            coeffs.side_shelf.magnitude_db_at(freq, fs),
        );
    }
    Ok(())
}

pub async fn preset_list(ctx: &Context) -> Result<()> {
    let saved = ctx.presets.list_presets().await?;

    for name in &saved {
        println!("{name}");
    }
    for name in FACTORY_PRESETS {
        if !saved.iter().any(|s| s == name) {
            println!("{name} (factory)");
        }
    }
    Ok(())
}

pub async fn preset_show(ctx: &Context, name: &str) -> Result<()> {
    let parameters = ctx.presets.load_preset(name).await?;
    for id in ParameterId::ALL {
        println!("{} = {}", id.key(), parameters.get(id));
    }
    Ok(())
}

pub async fn preset_save(ctx: &Context, name: &str, from: Option<&str>, set: &[String]) -> Result<()> {
    let mut parameters = match from {
        Some(base) => ctx.presets.load_preset(base).await?,
        None => ParameterSnapshot::default(),
    };
    apply_assignments(&mut parameters, set)?;

    ctx.presets.save_preset(name, &parameters).await?;
    println!("Saved {}", ctx.presets.preset_path(name).display());
    Ok(())
}

pub async fn preset_delete(ctx: &Context, name: &str) -> Result<()> {
    ctx.presets.delete_preset(name).await?;
    info!(name, "Preset deleted");
    Ok(())
}

#[cfg(feature = "live")]
pub fn devices() -> Result<()> {
    use spatial_saturator_core::domain::audio::AudioEnumerator;
    use spatial_saturator_infra::audio::CpalEnumerator;

    let enumerator = CpalEnumerator::default();
    for device in enumerator.devices()? {
        println!(
            "{:<40} {:?} {} ch{}",
            device.name,
            device.device_type,
            device.max_channels,
            device
                .default_sample_rate
                .map(|sr| format!(" @ {} Hz", sr.hz()))
                .unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(feature = "live")]
pub async fn live(ctx: &Context, preset: Option<&str>, set: &[String], watch: bool) -> Result<()> {
    use spatial_saturator_core::domain::audio::{ChannelCount, SampleRate, StreamConfig};
    use spatial_saturator_core::domain::config::ConfigWatcher;
    use spatial_saturator_core::domain::params::SharedParameters;
    use spatial_saturator_infra::audio::{LiveStream, LiveStreamConfig};
    use std::sync::Arc;
    use tracing::warn;

    let parameters = ctx.parameters(preset, set).await?;
    let shared = Arc::new(SharedParameters::new(&parameters));

    let config = LiveStreamConfig {
        input_device: None,
        output_device: None,
        stream: StreamConfig {
            sample_rate: SampleRate::from_hz(ctx.config.app.sample_rate),
            channels: ChannelCount::Stereo,
            buffer_size: ctx.config.app.buffer_size,
        },
    };
    let stream = LiveStream::start(&config, Arc::clone(&shared))?;
    println!("Processing live audio, press Ctrl-C to stop");

    match (watch, preset) {
        (true, Some(name)) => {
            let watcher = ConfigWatcher::new(ctx.presets.preset_dir().to_path_buf()).await?;
            let mut changes = watcher.subscribe();
            let preset_path = ctx.presets.preset_path(name);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = changes.recv() => {
                        let Ok(path) = changed else { continue };
                        if path.file_name() != preset_path.file_name() {
                            continue;
                        }
                        match PresetManager::load_preset_file(&path).await {
                            Ok(mut reloaded) => {
                                apply_assignments(&mut reloaded, set)?;
                                stream.parameters().store(&reloaded);
                                info!(name, "Preset reloaded");
                            }
                            Err(e) => warn!(name, error = %e, "Ignoring unreadable preset"),
                        }
                    }
                }
            }
        }
        (true, None) => {
            warn!("--watch needs --preset, not watching");
            tokio::signal::ctrl_c().await?;
        }
        (false, _) => tokio::signal::ctrl_c().await?,
    }

    info!(dropped = stream.dropped_blocks(), "Live stream stopped");
    Ok(())
}
