use serde::{Deserialize, Serialize};

use crate::util;

/// Thresholds for deciding whether a window carries usable pitch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// RMS level (dBFS) a window must reach to count as voice.
    pub min_rms_db: f32,
    /// Zero-crossing rate above which a window is treated as hiss or
    /// fricative noise rather than tonal voice.
    pub max_zero_crossing_rate: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_rms_db: -40.0,
            max_zero_crossing_rate: 0.25,
        }
    }
}

/// Why a window was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Voiced,
    TooQuiet,
    TooNoisy,
}

impl GateDecision {
    pub fn passes(self) -> bool {
        self == GateDecision::Voiced
    }
}

/// Voice-activity gate: both the energy test and the zero-crossing test
/// must pass, independently of what the pitch estimator would say.
#[derive(Debug, Clone)]
pub struct VoiceActivityGate {
    min_rms: f32,
    max_zcr: f32,
}

impl VoiceActivityGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            min_rms: util::db_to_linear(config.min_rms_db),
            max_zcr: config.max_zero_crossing_rate,
        }
    }

    pub fn check(&self, window: &[f32]) -> GateDecision {
        if util::rms(window) < self.min_rms {
            GateDecision::TooQuiet
        } else if util::zero_crossing_rate(window) > self.max_zcr {
            GateDecision::TooNoisy
        } else {
            GateDecision::Voiced
        }
    }
}
