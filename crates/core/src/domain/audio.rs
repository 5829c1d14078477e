//! Audio stream abstractions and domain models
//!
//! This module defines the host-facing audio types that are platform-agnostic.
//! Device access (cpal) and file rendering (hound) live in the `infra` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Error in audio stream creation or processing
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invalid configuration handed to the processing chain
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input/Output error at the OS level
    #[error("OS error: {0}")]
    OsError(String),

    /// The chain only handles stereo input at a positive sample rate
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Unique identifier for an audio device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz88200,
    Hz96000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz88200 => 88200,
            SampleRate::Hz96000 => 96000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            88200 => SampleRate::Hz88200,
            96000 => SampleRate::Hz96000,
            hz => SampleRate::Custom(hz),
        }
    }

    /// Sample rate as the floating point value the filters are derived from
    pub fn as_f64(&self) -> f64 {
        self.hz() as f64
    }
}

/// Number of audio channels
///
/// The processing chain is strictly stereo; the other variants exist so
/// adapters can describe what a device or file offers before rejecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
    Surround(u16),
}

impl ChannelCount {
    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
            ChannelCount::Surround(n) => *n,
        }
    }

    pub fn from_count(count: u16) -> Self {
        match count {
            1 => ChannelCount::Mono,
            2 => ChannelCount::Stereo,
            n => ChannelCount::Surround(n),
        }
    }

    /// Fail unless this is exactly two channels
    pub fn require_stereo(&self) -> Result<()> {
        match self {
            ChannelCount::Stereo => Ok(()),
            other => Err(AudioError::UnsupportedConfiguration(format!(
                "expected 2 channels, got {}",
                other.count()
            ))),
        }
    }
}

/// Configuration for an audio stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            channels: ChannelCount::Stereo,
            buffer_size: 512,
        }
    }
}

/// Type of audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
    Duplex,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub default_sample_rate: Option<SampleRate>,
    pub max_channels: u16,
}

impl DeviceInfo {
    /// Whether the device can carry a stereo stream
    pub fn supports_stereo(&self) -> bool {
        self.max_channels >= 2
    }
}

/// Trait for enumerating available audio devices
pub trait AudioEnumerator: Send + Sync {
    /// List all available audio devices
    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Get the default input device
    fn default_input_device(&self) -> Result<DeviceInfo>;

    /// Get the default output device
    fn default_output_device(&self) -> Result<DeviceInfo>;
}
