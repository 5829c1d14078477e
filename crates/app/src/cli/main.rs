//! Spatial Saturator CLI Application

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spatial-saturator")]
#[command(about = "Mid/side filtering and saturation for stereo audio", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preset directory (overrides the configured one)
    #[arg(long, global = true)]
    preset_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a stereo WAV file through the effect
    Process {
        input: PathBuf,
        output: PathBuf,

        /// Preset to start from (file in the preset directory or a factory preset)
        #[arg(short, long)]
        preset: Option<String>,

        /// Block size in frames (defaults to the configured buffer size)
        #[arg(short, long)]
        block_size: Option<usize>,

        /// Override a parameter, e.g. --set side_gain_db=9
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Print the render report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List parameters with their ranges and defaults
    Params {
        #[arg(long)]
        json: bool,
    },

    /// Print the magnitude response of the three filters
    Response {
        /// Sample rate in Hz (defaults to the configured one)
        #[arg(long)]
        sample_rate: Option<u32>,

        #[arg(short, long)]
        preset: Option<String>,

        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Manage presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// List audio devices
    #[cfg(feature = "live")]
    Devices,

    /// Process the default input to the default output in real time
    #[cfg(feature = "live")]
    Live {
        #[arg(short, long)]
        preset: Option<String>,

        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Reload the preset when its file changes
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// List saved and factory presets
    List,

    /// Show the values of a preset
    Show { name: String },

    /// Save a preset, starting from defaults or another preset
    Save {
        name: String,

        #[arg(long)]
        from: Option<String>,

        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Delete a saved preset
    Delete { name: String },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("Spatial Saturator starting");

    let ctx = commands::Context::load(cli.config.as_deref(), cli.preset_dir).await?;

    match cli.command {
        Command::Process {
            input,
            output,
            preset,
            block_size,
            set,
            json,
        } => commands::process(&ctx, input, output, preset.as_deref(), block_size, &set, json).await,
        Command::Params { json } => commands::params(json),
        Command::Response {
            sample_rate,
            preset,
            set,
        } => commands::response(&ctx, sample_rate, preset.as_deref(), &set).await,
        Command::Preset { action } => match action {
            PresetAction::List => commands::preset_list(&ctx).await,
            PresetAction::Show { name } => commands::preset_show(&ctx, &name).await,
            PresetAction::Save { name, from, set } => {
                commands::preset_save(&ctx, &name, from.as_deref(), &set).await
            }
            PresetAction::Delete { name } => commands::preset_delete(&ctx, &name).await,
        },
        #[cfg(feature = "live")]
        Command::Devices => commands::devices(),
        #[cfg(feature = "live")]
        Command::Live { preset, set, watch } => {
            commands::live(&ctx, preset.as_deref(), &set, watch).await
        }
    }
}
