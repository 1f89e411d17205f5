//! Frequency → label mapping: note names for display and the voice-range
//! classification for reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceError};

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// What the display shows when there is no pitch to name.
pub const NO_NOTE: &str = "---";

/// Nearest MIDI note number for a frequency, or `None` for f <= 0 / non-finite.
///
///   n = round(12 * log2(f / 440) + 69)
pub fn midi_note(hz: f32) -> Option<i32> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some((12.0 * (hz / 440.0).log2() + 69.0).round() as i32)
}

/// Convert a frequency to (note name, octave, cents offset from that note).
///
/// Cents are in [-50, +50]; positive means sharp.
pub fn freq_to_note(hz: f32) -> Option<(&'static str, i32, f32)> {
    let n = midi_note(hz)?;
    let exact = 12.0 * (hz / 440.0).log2() + 69.0;
    let cents = (exact - n as f32) * 100.0;
    let name = NOTE_NAMES[n.rem_euclid(12) as usize];
    let octave = n.div_euclid(12) - 1;
    Some((name, octave, cents))
}

/// Scientific pitch name such as "A4" or "C#3". `None` is the no-note
/// sentinel for f <= 0 or a missing frequency.
pub fn note_name(hz: f32) -> Option<String> {
    freq_to_note(hz).map(|(name, octave, _)| format!("{name}{octave}"))
}

/// Coarse vocal category derived from average fundamental frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceRange {
    Bass,
    Baritone,
    Tenor,
    Alto,
    #[serde(rename = "Mezzo-Soprano")]
    MezzoSoprano,
    Soprano,
}

impl VoiceRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceRange::Bass => "Bass",
            VoiceRange::Baritone => "Baritone",
            VoiceRange::Tenor => "Tenor",
            VoiceRange::Alto => "Alto",
            VoiceRange::MezzoSoprano => "Mezzo-Soprano",
            VoiceRange::Soprano => "Soprano",
        }
    }
}

impl fmt::Display for VoiceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered `(ceiling_hz, label)` bands plus a catch-all top label.
///
/// A frequency gets the label of the first band whose ceiling it is strictly
/// below; anything at or above the last ceiling gets `top`. Ceilings are
/// validated strictly increasing, so exactly one label applies.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRangeTable {
    bands: Vec<(f32, VoiceRange)>,
    top: VoiceRange,
}

impl VoiceRangeTable {
    pub fn new(bands: Vec<(f32, VoiceRange)>, top: VoiceRange) -> Result<Self> {
        for (ceiling, label) in &bands {
            if !ceiling.is_finite() || *ceiling <= 0.0 {
                return Err(VoiceError::config(format!(
                    "voice range ceiling for {label} must be a positive number, got {ceiling}"
                )));
            }
        }
        for pair in bands.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(VoiceError::config(format!(
                    "voice range ceilings must increase: {} ({} Hz) is not above {} ({} Hz)",
                    pair[1].1, pair[1].0, pair[0].1, pair[0].0
                )));
            }
        }
        Ok(Self { bands, top })
    }

    pub fn classify(&self, hz: f32) -> VoiceRange {
        self.bands
            .iter()
            .find(|(ceiling, _)| hz < *ceiling)
            .map(|(_, label)| *label)
            .unwrap_or(self.top)
    }
}

impl Default for VoiceRangeTable {
    fn default() -> Self {
        Self {
            bands: vec![
                (130.0, VoiceRange::Bass),
                (180.0, VoiceRange::Baritone),
                (280.0, VoiceRange::Tenor),
                (350.0, VoiceRange::Alto),
                (450.0, VoiceRange::MezzoSoprano),
            ],
            top: VoiceRange::Soprano,
        }
    }
}
