use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::{Result, VoiceError};

/// One supported input configuration of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputFormat {
    pub channels: u16,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    pub sample_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDevice {
    pub name: String,
    pub is_default: bool,
    /// Empty when the backend refused to report configurations.
    pub formats: Vec<InputFormat>,
}

/// Enumerate the audio input devices on the default host.
pub fn list_input_devices() -> Result<Vec<InputDevice>> {
    let host = cpal::default_host();

    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let devices = host
        .input_devices()
        .map_err(|e| VoiceError::CaptureUnavailable(format!("failed to list devices: {e}")))?;

    Ok(devices
        .map(|device| {
            let name = device.name().unwrap_or_else(|_| "<unknown>".into());
            let formats = match device.supported_input_configs() {
                Ok(configs) => configs
                    .map(|cfg| InputFormat {
                        channels: cfg.channels(),
                        min_sample_rate: cfg.min_sample_rate().0,
                        max_sample_rate: cfg.max_sample_rate().0,
                        sample_format: format!("{:?}", cfg.sample_format()),
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(device = %name, "could not query configs: {e}");
                    Vec::new()
                }
            };
            InputDevice {
                is_default: !default_name.is_empty() && name == default_name,
                name,
                formats,
            }
        })
        .collect())
}

impl InputFormat {
    /// "2ch  44100-48000 Hz  F32", collapsing a single rate.
    pub fn describe(&self) -> String {
        if self.min_sample_rate == self.max_sample_rate {
            format!(
                "{}ch  {} Hz  {}",
                self.channels, self.min_sample_rate, self.sample_format
            )
        } else {
            format!(
                "{}ch  {}-{} Hz  {}",
                self.channels, self.min_sample_rate, self.max_sample_rate, self.sample_format
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_collapses_fixed_rate() {
        let fixed = InputFormat {
            channels: 1,
            min_sample_rate: 48000,
            max_sample_rate: 48000,
            sample_format: "F32".into(),
        };
        assert_eq!(fixed.describe(), "1ch  48000 Hz  F32");

        let ranged = InputFormat {
            max_sample_rate: 96000,
            ..fixed
        };
        assert_eq!(ranged.describe(), "1ch  48000-96000 Hz  F32");
    }
}
