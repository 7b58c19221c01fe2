//! Output device discovery

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::info;

use crate::error::Result;
use crate::nodes::CpalSink;

/// A discovered audio output device
pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,
}

impl CpalDevice {
    /// The host's default output device, if there is one.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        Self::from_device(device)
    }

    /// Every output device that reports a usable default config.
    pub fn list_outputs() -> Vec<Self> {
        cpal::default_host()
            .output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self { device, config, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Open a stream on this device and wrap it as a sink node.
    pub fn create_sink(&self) -> Result<CpalSink> {
        info!(
            device = %self.name,
            sample_rate = self.sample_rate(),
            channels = self.channels(),
            "opening output device"
        );
        CpalSink::new(&self.device, &self.config)
    }
}
