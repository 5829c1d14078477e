//! CPAL-based device enumeration
//!
//! Describes what each host device offers so the CLI can list devices and
//! the live stream can pick stereo-capable ones.

use cpal::traits::{DeviceTrait, HostTrait};
use spatial_saturator_core::domain::audio::{
    AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, Result, SampleRate,
};
use tracing::{debug, info, warn};

/// Build a [`DeviceInfo`] from a CPAL device
pub fn describe_device(device: &cpal::Device, device_type: DeviceType) -> DeviceInfo {
    #[allow(deprecated)]
    let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());

    let input_channels = device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);
    let output_channels = device
        .supported_output_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);

    let max_channels = match device_type {
        DeviceType::Input => input_channels,
        DeviceType::Output => output_channels,
        DeviceType::Duplex => input_channels.min(output_channels),
    };

    let default_config = match device_type {
        DeviceType::Input => device.default_input_config(),
        _ => device.default_output_config(),
    };
    let default_sample_rate = default_config
        .ok()
        .map(|config| SampleRate::from_hz(config.sample_rate()));

    debug!("Described device: {} ({} channels)", name, max_channels);

    DeviceInfo {
        id: DeviceId::new(name.clone()),
        name,
        device_type,
        default_sample_rate,
        max_channels,
    }
}

/// Find a device by id (its name) or fall back to the host default
pub fn find_device(
    host: &cpal::Host,
    id: Option<&DeviceId>,
    device_type: DeviceType,
) -> Result<cpal::Device> {
    match id {
        Some(id) => {
            #[allow(deprecated)]
            let device = host
                .devices()
                .map_err(|e| AudioError::OsError(e.to_string()))?
                .find(|d| d.name().ok().as_deref() == Some(id.as_str()));
            device.ok_or_else(|| AudioError::DeviceNotFound(id.as_str().to_string()))
        }
        None => match device_type {
            DeviceType::Input => host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string())),
            _ => host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string())),
        },
    }
}

/// CPAL-based audio enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        info!("Initializing CPAL enumerator");
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    pub fn host(&self) -> &cpal::Host {
        &self.host
    }

    fn determine_device_type(device: &cpal::Device) -> Option<DeviceType> {
        let has_input = device
            .supported_input_configs()
            .map(|mut c| c.next().is_some())
            .unwrap_or(false);
        let has_output = device
            .supported_output_configs()
            .map(|mut c| c.next().is_some())
            .unwrap_or(false);

        match (has_input, has_output) {
            (true, true) => Some(DeviceType::Duplex),
            (true, false) => Some(DeviceType::Input),
            (false, true) => Some(DeviceType::Output),
            (false, false) => None,
        }
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating all audio devices");

        let cpal_devices = self
            .host
            .devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?;

        let mut devices = Vec::new();
        for device in cpal_devices {
            match Self::determine_device_type(&device) {
                Some(device_type) => devices.push(describe_device(&device, device_type)),
                None => warn!("Skipping device without inputs or outputs"),
            }
        }

        info!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    fn default_input_device(&self) -> Result<DeviceInfo> {
        let device = find_device(&self.host, None, DeviceType::Input)?;
        Ok(describe_device(&device, DeviceType::Input))
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        let device = find_device(&self.host, None, DeviceType::Output)?;
        Ok(describe_device(&device, DeviceType::Output))
    }
}
