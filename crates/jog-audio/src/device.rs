//! Output device discovery.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{AudioError, AudioResult};

/// Default output device of the default host.
pub fn default_output_device() -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    host.default_output_device().ok_or(AudioError::NoDevice)
}

/// Names of all available output devices, for diagnostics.
pub fn output_device_names() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            log::warn!("Failed to enumerate output devices: {e}");
            Vec::new()
        }
    }
}
