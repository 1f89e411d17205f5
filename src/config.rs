use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dsp::gate::GateConfig;
use crate::dsp::notes::{VoiceRange, VoiceRangeTable};
use crate::dsp::pitch::{EstimatorConfig, EstimatorKind};
use crate::error::VoiceError;
use crate::paths;

/// Application configuration, loaded from config.toml.
///
/// serde's `default` attribute means: if a field is missing from the TOML file,
/// use the value from the Default implementation instead of failing to parse.
/// This makes the config file optional; every field has a sensible default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub monitor: MonitorConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Input device name as listed by `voxrange devices`, or "default".
    pub device: String,
}

/// Live monitor settings. The monitor never filters, so it only needs a
/// window length and a tick cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub window_size: usize,
    /// Milliseconds between ticks. 16 ms ≈ 60 Hz.
    pub tick_ms: u64,
}

/// Batch analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window_size: usize,
    pub hop_size: usize,
    pub min_hz: f32,
    pub max_hz: f32,
    /// Windows below this RMS level (dBFS) skip pitch detection entirely.
    pub silence_threshold_db: f32,
    pub estimator: EstimatorKind,
    pub yin_threshold: f32,
    /// Total fraction of sorted frequencies discarded before averaging,
    /// split evenly between the low and high tails.
    pub outlier_trim_fraction: f32,
    pub gate: GateConfig,
    pub filters: FilterConfig,
    pub voice_ranges: VoiceRangeConfig,
}

/// Preprocessing applied once to the whole recording, in this order:
/// high-pass → spectral noise suppression → median despike.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// High-pass cutoff in Hz. 0 disables the filter.
    pub high_pass_hz: f32,
    pub noise_suppression: bool,
    /// How much of the recording's opening is searched for quiet blocks.
    pub noise_profile_secs: f32,
    /// Blocks quieter than this (dBFS) count as background noise.
    pub noise_floor_db: f32,
    /// Over-subtraction factor.
    pub alpha: f32,
    /// Spectral floor, as a fraction of the original magnitude.
    pub beta: f32,
    /// Median window, must be odd. 1 disables despiking.
    pub despike_window: usize,
}

/// Upper bound (exclusive) of each voice category in Hz. Anything at or
/// above `mezzo_soprano` is Soprano.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceRangeConfig {
    pub bass: f32,
    pub baritone: f32,
    pub tenor: f32,
    pub alto: f32,
    pub mezzo_soprano: f32,
}

// --- Default implementations ---

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            tick_ms: 16,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 1024,
            min_hz: 60.0,
            max_hz: 1000.0,
            silence_threshold_db: -50.0,
            estimator: EstimatorKind::default(),
            yin_threshold: 0.15,
            outlier_trim_fraction: 0.15,
            gate: GateConfig::default(),
            filters: FilterConfig::default(),
            voice_ranges: VoiceRangeConfig::default(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            high_pass_hz: 40.0,
            noise_suppression: true,
            noise_profile_secs: 0.5,
            noise_floor_db: -45.0,
            alpha: 2.0,
            beta: 0.02,
            despike_window: 3,
        }
    }
}

impl Default for VoiceRangeConfig {
    fn default() -> Self {
        Self {
            bass: 130.0,
            baritone: 180.0,
            tenor: 280.0,
            alto: 350.0,
            mezzo_soprano: 450.0,
        }
    }
}

impl VoiceRangeConfig {
    /// Build the lookup table, rejecting ceilings that don't strictly increase.
    pub fn table(&self) -> Result<VoiceRangeTable, VoiceError> {
        VoiceRangeTable::new(
            vec![
                (self.bass, VoiceRange::Bass),
                (self.baritone, VoiceRange::Baritone),
                (self.tenor, VoiceRange::Tenor),
                (self.alto, VoiceRange::Alto),
                (self.mezzo_soprano, VoiceRange::MezzoSoprano),
            ],
            VoiceRange::Soprano,
        )
    }
}

impl AnalysisConfig {
    /// Check every knob the batch analyzer depends on.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.window_size == 0 {
            return Err(VoiceError::config("window_size must be greater than 0"));
        }
        if self.hop_size == 0 {
            return Err(VoiceError::config("hop_size must be greater than 0"));
        }
        if !(self.min_hz > 0.0 && self.min_hz < self.max_hz) {
            return Err(VoiceError::config(format!(
                "frequency bounds must satisfy 0 < min_hz < max_hz, got {} and {}",
                self.min_hz, self.max_hz
            )));
        }
        if !(0.0..1.0).contains(&self.outlier_trim_fraction) {
            return Err(VoiceError::config(format!(
                "outlier_trim_fraction must be in [0, 1), got {}",
                self.outlier_trim_fraction
            )));
        }
        if self.filters.despike_window % 2 == 0 {
            return Err(VoiceError::config(format!(
                "despike_window must be odd, got {}",
                self.filters.despike_window
            )));
        }
        if self.filters.alpha < 0.0 {
            return Err(VoiceError::config(format!(
                "alpha must be non-negative, got {}",
                self.filters.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.filters.beta) {
            return Err(VoiceError::config(format!(
                "beta must be in [0, 1], got {}",
                self.filters.beta
            )));
        }
        self.voice_ranges.table()?;
        Ok(())
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.window_size == 0 {
            return Err(VoiceError::config("monitor window_size must be greater than 0"));
        }
        if self.tick_ms == 0 {
            return Err(VoiceError::config("monitor tick_ms must be greater than 0"));
        }
        Ok(())
    }
}

/// Bridge between the user-facing config format and the estimator's
/// internal parameters.
impl From<&AnalysisConfig> for EstimatorConfig {
    fn from(cfg: &AnalysisConfig) -> Self {
        EstimatorConfig {
            min_hz: cfg.min_hz,
            max_hz: cfg.max_hz,
            silence_threshold_db: cfg.silence_threshold_db,
            yin_threshold: cfg.yin_threshold,
            ..EstimatorConfig::default()
        }
    }
}

/// Load the application config from $XDG_CONFIG_HOME/voxrange/config.toml.
/// If the file doesn't exist, returns defaults.
pub fn load_config() -> Result<AppConfig> {
    let path = paths::config_file();

    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.analysis.window_size, 2048);
        assert_eq!(cfg.analysis.hop_size, 1024);
        assert_eq!(cfg.analysis.min_hz, 60.0);
        assert_eq!(cfg.analysis.max_hz, 1000.0);
        assert_eq!(cfg.analysis.estimator, EstimatorKind::Autocorrelation);
        assert_eq!(cfg.monitor.tick_ms, 16);
        assert_eq!(cfg.capture.device, "default");
        assert!(cfg.analysis.validate().is_ok());
        assert!(cfg.monitor.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml() {
        // If the user only specifies some fields, the rest should use defaults
        let toml_str = r#"
[analysis]
min_hz = 70.0
estimator = "yin"

[analysis.filters]
noise_suppression = false
"#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.analysis.min_hz, 70.0);
        assert_eq!(cfg.analysis.estimator, EstimatorKind::Yin);
        assert!(!cfg.analysis.filters.noise_suppression);
        // Unspecified fields should be defaults
        assert_eq!(cfg.analysis.max_hz, 1000.0);
        assert_eq!(cfg.analysis.filters.despike_window, 3);
        assert_eq!(cfg.analysis.voice_ranges.bass, 130.0);
        assert_eq!(cfg.monitor.window_size, 2048);
    }

    #[test]
    fn estimator_config_conversion() {
        let cfg = AnalysisConfig {
            min_hz: 80.0,
            yin_threshold: 0.1,
            ..AnalysisConfig::default()
        };
        let est: EstimatorConfig = (&cfg).into();
        assert_eq!(est.min_hz, 80.0);
        assert_eq!(est.max_hz, 1000.0);
        assert_eq!(est.yin_threshold, 0.1);
    }

    #[test]
    fn roundtrip_toml() {
        let cfg = AppConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let loaded: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.analysis.hop_size, cfg.analysis.hop_size);
        assert_eq!(loaded.analysis.voice_ranges.tenor, cfg.analysis.voice_ranges.tenor);
    }

    #[test]
    fn rejects_zero_window_and_hop() {
        let cfg = AnalysisConfig {
            window_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(VoiceError::InvalidConfiguration(_))));

        let cfg = AnalysisConfig {
            hop_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(VoiceError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_even_despike_window() {
        let mut cfg = AnalysisConfig::default();
        cfg.filters.despike_window = 4;
        assert!(matches!(cfg.validate(), Err(VoiceError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_non_monotonic_voice_ranges() {
        let mut cfg = AnalysisConfig::default();
        cfg.voice_ranges.tenor = 170.0; // below baritone's 180
        assert!(matches!(cfg.validate(), Err(VoiceError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_inverted_bounds_and_bad_trim() {
        let cfg = AnalysisConfig {
            min_hz: 500.0,
            max_hz: 400.0,
            ..AnalysisConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AnalysisConfig {
            outlier_trim_fraction: 1.0,
            ..AnalysisConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_suppression_parameters() {
        let mut cfg = AnalysisConfig::default();
        cfg.filters.alpha = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.filters.beta = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn voice_range_table_from_config() {
        let table = VoiceRangeConfig::default().table().unwrap();
        assert_eq!(table.classify(130.0), VoiceRange::Baritone);
        assert_eq!(table, VoiceRangeTable::default());
    }
}
