use std::io;

use console::{style, Term};

use crate::analysis::batch::AnalysisReport;
use crate::audio::devices::InputDevice;
use crate::audio::monitor::LiveState;
use crate::dsp::notes::{freq_to_note, NO_NOTE};

const VOLUME_BAR_WIDTH: usize = 20;
/// Quietest level the volume bar shows; anything below is an empty bar.
const VOLUME_FLOOR_DB: f32 = -60.0;

/// Fill `width` cells proportionally to where `db` sits between the floor
/// and 0 dBFS.
pub fn volume_bar(db: f32, width: usize) -> String {
    let fraction = ((db - VOLUME_FLOOR_DB) / -VOLUME_FLOOR_DB).clamp(0.0, 1.0);
    let filled = (fraction * width as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "·".repeat(width - filled))
}

/// One line of live output: note, frequency, tuning, volume. Unvoiced
/// windows show the no-note placeholder.
pub fn live_line(state: &LiveState) -> String {
    let note = state.note_name.as_deref().unwrap_or(NO_NOTE);
    let (hz, cents) = match state.frequency_hz {
        Some(hz) => {
            let cents = freq_to_note(hz)
                .map(|(_, _, cents)| format!("{cents:+4.0}c"))
                .unwrap_or_default();
            (format!("{hz:7.1} Hz"), cents)
        }
        None => (format!("{:>7} Hz", "--"), String::new()),
    };
    format!(
        "{:<4} {} {:>5}  {}",
        note,
        hz,
        cents,
        volume_bar(state.volume_db(), VOLUME_BAR_WIDTH)
    )
}

/// Redraws a single status line on stderr.
pub struct ConsoleDisplay {
    term: Term,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self { term: Term::stderr() }
    }

    pub fn render_live(&self, state: &LiveState) -> io::Result<()> {
        self.term.clear_line()?;
        let line = live_line(state);
        let line = if state.frequency_hz.is_some() {
            style(line).green().to_string()
        } else {
            style(line).dim().to_string()
        };
        self.term.write_str(&format!("\r  {line}"))
    }

    pub fn finish_live(&self) -> io::Result<()> {
        self.term.clear_line()?;
        self.term.write_str("\r")
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

pub fn print_report(report: &AnalysisReport) {
    println!();
    println!("  {}", style("Voice Range").bold());
    println!();
    println!("  Range:      {}", style(report.range).green().bold());
    println!("  Average:    {:.1} Hz", report.avg_frequency_hz);
    println!(
        "  Span:       {:.1} - {:.1} Hz",
        report.min_frequency_hz, report.max_frequency_hz
    );
    println!(
        "  Voiced:     {} of {} windows",
        report.voiced_windows, report.total_windows
    );
    println!();
}

pub fn report_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn print_devices(devices: &[InputDevice]) {
    if devices.is_empty() {
        eprintln!("No audio input devices found.");
        return;
    }

    println!("{}", style("Audio Input Devices").bold());
    println!();

    for device in devices {
        if device.is_default {
            println!("  {} {}", style("*").green().bold(), style(&device.name).green().bold());
        } else {
            println!("    {}", style(&device.name).bold());
        }
        if device.formats.is_empty() {
            println!("      Could not query configs");
        }
        for format in &device.formats {
            println!("      {}", format.describe());
        }
        println!();
    }

    if devices.iter().any(|d| d.is_default) {
        println!("  {} = default device", style("*").green().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::notes::VoiceRange;

    #[test]
    fn volume_bar_bounds() {
        assert_eq!(volume_bar(-120.0, 4), "····");
        assert_eq!(volume_bar(0.0, 4), "████");
        assert_eq!(volume_bar(-30.0, 4), "██··");
        assert_eq!(volume_bar(6.0, 4), "████");
    }

    #[test]
    fn live_line_with_note() {
        let state = LiveState {
            frequency_hz: Some(440.0),
            note_name: Some("A4".into()),
            volume_level: 0.5,
        };
        let line = live_line(&state);
        assert!(line.starts_with("A4"));
        assert!(line.contains("440.0 Hz"));
        assert!(line.contains("+0c"));
    }

    #[test]
    fn live_line_without_note_uses_placeholder() {
        let line = live_line(&LiveState::default());
        assert!(line.starts_with(NO_NOTE));
        assert!(line.contains("-- Hz"));
        assert!(line.ends_with(&"·".repeat(VOLUME_BAR_WIDTH)));
    }

    #[test]
    fn json_report_fields() {
        let report = AnalysisReport {
            range: VoiceRange::MezzoSoprano,
            avg_frequency_hz: 400.0,
            min_frequency_hz: 350.0,
            max_frequency_hz: 440.0,
            voiced_windows: 10,
            total_windows: 12,
        };
        let json = report_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["range"], "Mezzo-Soprano");
        assert_eq!(value["voiced_windows"], 10);
        assert_eq!(value["total_windows"], 12);
    }
}
