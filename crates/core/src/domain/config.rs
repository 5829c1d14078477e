//! Configuration management for the spatial saturator
//!
//! This module provides:
//! - Application settings and parameter values in one TOML document
//! - Preset system (one TOML file of parameter values per preset)
//! - Main config manager with corrupt-file recovery
//! - Hot-reload support via file system watcher

use crate::domain::params::{ParameterId, ParameterSnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sample rate used when the host does not dictate one
    pub sample_rate: u32,

    /// Processing block size in frames
    pub buffer_size: u32,

    /// Preset directory
    pub preset_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 512,
            preset_dir: PathBuf::from("presets"),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Complete configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialSaturatorConfig {
    pub app: AppConfig,
    pub parameters: ParameterSnapshot,
}

impl SpatialSaturatorConfig {
    /// Load configuration from TOML file
    ///
    /// Out-of-range parameters are clamped with a warning.
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let mut config: Self = toml::from_str(&contents)?;
        config.app.validate()?;
        config.parameters = clamp_with_warning(&config.parameters);

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }
}

fn clamp_with_warning(parameters: &ParameterSnapshot) -> ParameterSnapshot {
    for id in parameters.out_of_range() {
        let range = id.range();
        warn!(
            parameter = id.key(),
            value = parameters.get(id),
            min = range.min,
            max = range.max,
            "Parameter out of range, clamping"
        );
    }
    parameters.clamped()
}

/// Parse a `key=value` parameter assignment
pub fn parse_assignment(assignment: &str) -> Result<(ParameterId, f32)> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Invalid(format!("expected key=value, got '{assignment}'")))?;

    let key = key.trim();
    let id = ParameterId::from_key(key).ok_or_else(|| ConfigError::UnknownParameter(key.to_string()))?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("'{}' is not a number for {}", value.trim(), key)))?;

    Ok((id, value))
}

/// Apply `key=value` assignments to a snapshot, clamping each value
pub fn apply_assignments<S: AsRef<str>>(
    parameters: &mut ParameterSnapshot,
    assignments: &[S],
) -> Result<()> {
    for assignment in assignments {
        let (id, value) = parse_assignment(assignment.as_ref())?;
        let clamped = id.range().clamp(value);
        if clamped != value {
            warn!(parameter = id.key(), value, clamped, "Parameter out of range, clamping");
        }
        parameters.set(id, clamped);
    }
    Ok(())
}

/// File system watcher for hot-reload
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
    config_tx: broadcast::Sender<PathBuf>,
}

impl ConfigWatcher {
    /// Watch `dir` for created or modified `.toml` files
    pub async fn new(dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (config_tx, _config_rx) = broadcast::channel(32);

        fs::create_dir_all(&dir).await?;

        let tx_clone = config_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                    ) {
                        for path in event.paths {
                            if path.extension().and_then(|e| e.to_str()) == Some("toml")
                                && tx_clone.send(path).is_err()
                            {
                                debug!("Config change dropped, no subscribers");
                            }
                        }
                    }
                }
                Err(e) => error!("Config watch error: {}", e),
            }
        })?;

        watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;

        info!(path = %dir.display(), "Config watcher started");

        Ok(Self {
            _watcher: watcher,
            config_tx,
        })
    }

    /// Subscribe to config change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.config_tx.subscribe()
    }
}

/// Preset manager
///
/// A preset is a TOML file of parameter values at `<preset_dir>/<name>.toml`.
/// The bundled factory presets are found when no file of that name exists.
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    /// Path of the preset file for a name that has passed validation
    fn validated_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!("invalid preset name '{name}'")));
        }
        Ok(self.preset_path(name))
    }

    pub fn preset_path(&self, name: &str) -> PathBuf {
        self.preset_dir.join(format!("{}.toml", name))
    }

    /// List presets saved on disk
    ///
    /// A missing preset directory lists as empty.
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        if !self.preset_dir.exists() {
            return Ok(presets);
        }

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name, falling back to the factory presets
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<ParameterSnapshot> {
        let path = self.validated_path(name)?;

        if path.exists() {
            return Self::load_preset_file(&path).await;
        }

        match ParameterSnapshot::factory_preset(name) {
            Some(parameters) => {
                debug!(name, "Using factory preset");
                Ok(parameters)
            }
            None => Err(ConfigError::PresetNotFound(name.to_string())),
        }
    }

    /// Load parameter values from a preset file path
    pub async fn load_preset_file(path: &Path) -> Result<ParameterSnapshot> {
        let contents = fs::read_to_string(path).await?;
        let parameters: ParameterSnapshot = toml::from_str(&contents)?;
        info!(path = %path.display(), "Preset loaded");
        Ok(clamp_with_warning(&parameters))
    }

    /// Save a preset by name
    #[instrument(skip(self, parameters))]
    pub async fn save_preset(&self, name: &str, parameters: &ParameterSnapshot) -> Result<()> {
        let path = self.validated_path(name)?;
        fs::create_dir_all(&self.preset_dir).await?;

        let toml_str = toml::to_string_pretty(&parameters.clamped())?;
        fs::write(&path, toml_str).await?;

        info!(name, path = %path.display(), "Preset saved");
        Ok(())
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.validated_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a preset file exists; invalid names never do
    pub async fn preset_exists(&self, name: &str) -> bool {
        match self.validated_path(name) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Manages the main configuration file
///
/// Lives at `<config dir>/spatial-saturator/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// `~/.config/spatial-saturator` on Linux, the platform equivalent elsewhere.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("spatial-saturator"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns the factory default.
    /// If the config file is corrupt, backs it up and returns the factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SpatialSaturatorConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = SpatialSaturatorConfig::factory_default();
            if let Err(e) = self.save(&config).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match SpatialSaturatorConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                SpatialSaturatorConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &SpatialSaturatorConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    /// Delete the config file
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(path = %self.config_path.display(), "Configuration cleared");
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let mut config = SpatialSaturatorConfig::factory_default();
        config.parameters.side_gain_db = 9.5;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: SpatialSaturatorConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
        assert!(toml_str.contains("[parameters]"));
        assert!(toml_str.contains("side_gain_db = 9.5"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: SpatialSaturatorConfig = toml::from_str(
            r#"
            [app]
            buffer_size = 256

            [parameters]
            mid_freq_hz = 400.0
            "#,
        )
        .unwrap();

        assert_eq!(parsed.app.buffer_size, 256);
        assert_eq!(parsed.app.sample_rate, 48000);
        assert_eq!(parsed.parameters.mid_freq_hz, 400.0);
        assert_eq!(parsed.parameters.mid_gain_db, 2.5);
    }

    #[test]
    fn test_app_config_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let zero_block = AppConfig {
            buffer_size: 0,
            ..AppConfig::default()
        };
        assert!(matches!(zero_block.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_assignment() {
        let (id, value) = parse_assignment("side_gain_db=7.5").unwrap();
        assert_eq!(id, ParameterId::SideGainDb);
        assert_eq!(value, 7.5);

        let (id, _) = parse_assignment(" tanh_slope = 3 ").unwrap();
        assert_eq!(id, ParameterId::TanhSlope);

        assert!(matches!(
            parse_assignment("volume=1"),
            Err(ConfigError::UnknownParameter(_))
        ));
        assert!(matches!(parse_assignment("mid_gain_db"), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            parse_assignment("mid_gain_db=loud"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_apply_assignments_clamps() {
        let mut parameters = ParameterSnapshot::default();
        apply_assignments(&mut parameters, &["mid_gain_db=20", "saturator_mix=75"]).unwrap();

        assert_eq!(parameters.mid_gain_db, 12.0);
        assert_eq!(parameters.saturator_mix, 75.0);
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = SpatialSaturatorConfig::factory_default();
        config.app.sample_rate = 44100;
        config.save_to_file(&config_path).await.unwrap();

        assert!(config_path.exists());

        let loaded = SpatialSaturatorConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_clamps_parameters() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[parameters]\nside_freq_upper_hz = 50.0\n")
            .await
            .unwrap();

        let loaded = SpatialSaturatorConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded.parameters.side_freq_upper_hz, 1000.0);
    }

    #[tokio::test]
    async fn test_preset_manager() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().join("presets"));

        assert!(manager.list_presets().await.unwrap().is_empty());

        let mut parameters = ParameterSnapshot::default();
        parameters.sine_frequency = 33.0;
        manager.save_preset("test_preset", &parameters).await.unwrap();

        assert!(manager.preset_exists("test_preset").await);

        let presets = manager.list_presets().await.unwrap();
        assert_eq!(presets, vec!["test_preset"]);

        let loaded = manager.load_preset("test_preset").await.unwrap();
        assert_eq!(loaded, parameters);

        manager.delete_preset("test_preset").await.unwrap();
        assert!(!manager.preset_exists("test_preset").await);
        assert!(matches!(
            manager.delete_preset("test_preset").await,
            Err(ConfigError::PresetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_factory_preset_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().to_path_buf());

        let wide = manager.load_preset("wide").await.unwrap();
        assert_eq!(Some(wide), ParameterSnapshot::factory_preset("wide"));

        assert!(matches!(
            manager.load_preset("nope").await,
            Err(ConfigError::PresetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_overrides_factory_preset() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().to_path_buf());

        let mut custom = ParameterSnapshot::default();
        custom.make_up_gain_db = -4.0;
        manager.save_preset("default", &custom).await.unwrap();

        assert_eq!(manager.load_preset("default").await.unwrap(), custom);
    }

    #[tokio::test]
    async fn test_invalid_preset_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().to_path_buf());
        let parameters = ParameterSnapshot::default();

        assert!(manager.save_preset("", &parameters).await.is_err());
        assert!(manager.save_preset("../escape", &parameters).await.is_err());
        assert!(manager.save_preset("..", &parameters).await.is_err());
    }

    #[tokio::test]
    async fn test_preset_names_cannot_leave_preset_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_manager = ConfigManager::new(temp_dir.path().to_path_buf());
        config_manager
            .save(&SpatialSaturatorConfig::factory_default())
            .await
            .unwrap();

        let presets = PresetManager::new(temp_dir.path().join("presets"));
        presets
            .save_preset("kept", &ParameterSnapshot::default())
            .await
            .unwrap();

        let err = presets.delete_preset("../config").await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(config_manager.exists());

        assert!(matches!(
            presets.load_preset("../config").await,
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            presets.load_preset("sub\\config").await,
            Err(ConfigError::Invalid(_))
        ));
        assert!(!presets.preset_exists("../config").await);
        assert!(presets.preset_exists("kept").await);
    }

    #[tokio::test]
    async fn test_config_manager_creates_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().join("spatial-saturator"));

        assert!(!manager.exists());
        let config = manager.load().await;

        assert_eq!(config, SpatialSaturatorConfig::factory_default());
        assert!(manager.exists());

        manager.clear().await.unwrap();
        assert!(!manager.exists());
    }

    #[tokio::test]
    async fn test_config_manager_backs_up_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());
        fs::write(manager.config_path(), "this is = = not toml").await.unwrap();

        let config = manager.load().await;

        assert_eq!(config, SpatialSaturatorConfig::factory_default());
        assert!(temp_dir.path().join("config.toml.corrupt").exists());
    }

    #[tokio::test]
    async fn test_config_watcher_reports_toml_changes() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = ConfigWatcher::new(temp_dir.path().to_path_buf()).await.unwrap();
        let mut rx = watcher.subscribe();

        let path = temp_dir.path().join("live.toml");
        fs::write(&path, "mid_gain_db = 3.0\n").await.unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no change event")
            .unwrap();
        assert_eq!(changed.file_name(), path.file_name());
    }
}
