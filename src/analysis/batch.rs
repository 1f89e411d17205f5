use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::stats;
use crate::config::AnalysisConfig;
use crate::dsp::frames::{self, SampleBuffer};
use crate::dsp::gate::{GateDecision, VoiceActivityGate};
use crate::dsp::noise::{self, NoiseProfile};
use crate::dsp::notes::{VoiceRange, VoiceRangeTable};
use crate::dsp::pitch::{self, PitchEstimator};
use crate::dsp::filters;
use crate::error::{Result, VoiceError};
use crate::util;

/// Final result of analyzing one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub range: VoiceRange,
    pub avg_frequency_hz: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    /// Windows that passed the gate and produced an in-bounds pitch.
    pub voiced_windows: usize,
    pub total_windows: usize,
}

/// Runs preprocessing, windowing, gating, estimation and aggregation over a
/// finished recording.
///
/// Holds only configuration; each call builds fresh estimator state, so two
/// runs over identical input produce identical reports.
pub struct BatchAnalyzer {
    config: AnalysisConfig,
    table: VoiceRangeTable,
}

impl BatchAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let table = config.voice_ranges.table()?;
        Ok(Self { config, table })
    }

    /// Number of windows `analyze` will visit for a buffer of `len` samples.
    pub fn window_count(&self, len: usize) -> usize {
        frames::window_count(len, self.config.window_size, self.config.hop_size)
    }

    pub fn analyze(&self, buffer: &SampleBuffer) -> Result<AnalysisReport> {
        self.analyze_with_progress(buffer, |_| {})
    }

    /// Same as `analyze`, calling `on_window` with the number of windows
    /// processed so far after each one.
    pub fn analyze_with_progress<F>(&self, buffer: &SampleBuffer, mut on_window: F) -> Result<AnalysisReport>
    where
        F: FnMut(usize),
    {
        let sample_rate = buffer.sample_rate();
        debug!(
            secs = buffer.duration_secs(),
            peak_db = util::peak_db(buffer.samples()),
            rms_db = util::rms_db(buffer.samples()),
            "analyzing recording"
        );
        let cleaned = self.preprocess(buffer)?;

        let gate = VoiceActivityGate::new(&self.config.gate);
        let mut estimator = pitch::build_estimator(self.config.estimator, (&self.config).into());

        let mut frequencies = Vec::new();
        let mut total = 0;
        let mut too_quiet = 0;
        let mut too_noisy = 0;

        for window in frames::windows(&cleaned, self.config.window_size, self.config.hop_size) {
            total += 1;
            match gate.check(window.samples) {
                GateDecision::TooQuiet => too_quiet += 1,
                GateDecision::TooNoisy => too_noisy += 1,
                GateDecision::Voiced => {
                    let estimate = estimator.estimate(window.samples, sample_rate);
                    trace!(at = window.time(sample_rate), ?estimate, "window");
                    if let Some(hz) = estimate.frequency() {
                        frequencies.push(hz);
                    }
                }
            }
            on_window(total);
        }

        debug!(
            total,
            voiced = frequencies.len(),
            too_quiet,
            too_noisy,
            estimator = estimator.name(),
            "window pass complete"
        );

        let report = self.aggregate(&frequencies, total)?;
        info!(
            range = %report.range,
            avg_hz = report.avg_frequency_hz,
            "analysis complete"
        );
        Ok(report)
    }

    /// High-pass → spectral noise suppression → median despike, once over
    /// the whole buffer.
    fn preprocess(&self, buffer: &SampleBuffer) -> Result<Vec<f32>> {
        let filters_cfg = &self.config.filters;
        let sample_rate = buffer.sample_rate();

        let mut samples = filters::high_pass(buffer.samples(), sample_rate, filters_cfg.high_pass_hz);

        if filters_cfg.noise_suppression {
            match NoiseProfile::estimate(
                &samples,
                sample_rate,
                filters_cfg.noise_profile_secs,
                filters_cfg.noise_floor_db,
            ) {
                Some(profile) => {
                    samples = noise::spectral_noise_suppress(
                        &samples,
                        &profile,
                        filters_cfg.alpha,
                        filters_cfg.beta,
                    );
                }
                None => warn!(
                    lead_secs = filters_cfg.noise_profile_secs,
                    "no quiet lead-in to learn noise from, skipping suppression"
                ),
            }
        }

        filters::median_despike(&samples, filters_cfg.despike_window)
    }

    /// Sort, trim the tails, average what's left.
    fn aggregate(&self, frequencies: &[f32], total_windows: usize) -> Result<AnalysisReport> {
        if frequencies.is_empty() {
            return Err(VoiceError::InsufficientVoiceData);
        }

        let sorted = stats::sorted(frequencies);
        let kept = stats::trim_tails(&sorted, self.config.outlier_trim_fraction);
        debug!(
            collected = sorted.len(),
            kept = kept.len(),
            median_hz = ?stats::percentile(&sorted, 0.5),
            "trimmed outliers"
        );

        let avg = stats::mean(kept).ok_or(VoiceError::InsufficientVoiceData)?;
        let min = kept[0];
        let max = kept[kept.len() - 1];

        Ok(AnalysisReport {
            range: self.table.classify(avg),
            avg_frequency_hz: avg,
            min_frequency_hz: min,
            max_frequency_hz: max,
            voiced_windows: frequencies.len(),
            total_windows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::pitch::EstimatorKind;
    use std::f32::consts::PI;

    const SR: u32 = 48000;

    fn tone(freq_hz: f32, secs: f32, amp: f32) -> Vec<f32> {
        let n = (SR as f32 * secs) as usize;
        (0..n)
            .map(|i| amp * (2.0 * PI * freq_hz * i as f32 / SR as f32).sin())
            .collect()
    }

    /// Linear sweep with continuous phase.
    fn sweep(from_hz: f32, to_hz: f32, secs: f32) -> Vec<f32> {
        let n = (SR as f32 * secs) as usize;
        let rate = (to_hz - from_hz) / secs;
        (0..n)
            .map(|i| {
                let t = i as f64 / SR as f64;
                let phase = 2.0 * std::f64::consts::PI
                    * (from_hz as f64 * t + 0.5 * rate as f64 * t * t);
                (0.5 * phase.sin()) as f32
            })
            .collect()
    }

    fn noise(n: usize, amp: f32, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amp
            })
            .collect()
    }

    fn analyzer() -> BatchAnalyzer {
        BatchAnalyzer::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn silence_is_insufficient_voice_data() {
        let buffer = SampleBuffer::new(vec![0.0; SR as usize * 2], SR);
        let err = analyzer().analyze(&buffer).unwrap_err();
        assert!(matches!(err, VoiceError::InsufficientVoiceData));
    }

    #[test]
    fn buffer_shorter_than_a_window_fails() {
        let buffer = SampleBuffer::new(tone(200.0, 0.02, 0.5), SR);
        assert!(matches!(
            analyzer().analyze(&buffer),
            Err(VoiceError::InsufficientVoiceData)
        ));
    }

    #[test]
    fn loud_hiss_is_insufficient_voice_data() {
        let buffer = SampleBuffer::new(noise(SR as usize, 0.5, 99), SR);
        assert!(matches!(
            analyzer().analyze(&buffer),
            Err(VoiceError::InsufficientVoiceData)
        ));
    }

    #[test]
    fn sweep_spans_its_range() {
        let buffer = SampleBuffer::new(sweep(100.0, 400.0, 4.0), SR);
        let report = analyzer().analyze(&buffer).unwrap();

        assert!(
            (report.min_frequency_hz - 100.0).abs() < 30.0,
            "min should be near 100 Hz, got {:.1}",
            report.min_frequency_hz
        );
        assert!(
            (report.max_frequency_hz - 400.0).abs() < 30.0,
            "max should be near 400 Hz, got {:.1}",
            report.max_frequency_hz
        );
        assert!(report.min_frequency_hz < report.avg_frequency_hz);
        assert!(report.avg_frequency_hz < report.max_frequency_hz);
        assert!((report.avg_frequency_hz - 250.0).abs() < 20.0);
        assert_eq!(report.range, VoiceRange::Tenor);
        assert_eq!(report.total_windows, 186);
        assert!(report.voiced_windows > 150);
    }

    #[test]
    fn steady_tone_classifies() {
        let cases = [
            (110.0, VoiceRange::Bass),
            (150.0, VoiceRange::Baritone),
            (220.0, VoiceRange::Tenor),
            (300.0, VoiceRange::Alto),
            (400.0, VoiceRange::MezzoSoprano),
            (523.25, VoiceRange::Soprano),
        ];
        for (hz, expected) in cases {
            let buffer = SampleBuffer::new(tone(hz, 1.0, 0.5), SR);
            let report = analyzer().analyze(&buffer).unwrap();
            assert!((report.avg_frequency_hz - hz).abs() / hz < 0.01, "{hz}: {report:?}");
            assert_eq!(report.range, expected, "{hz} Hz");
        }
    }

    #[test]
    fn quiet_lead_in_and_background_hiss() {
        // Half a second of room noise, then a sung note over the same noise
        let mut samples = noise(SR as usize / 2, 0.003, 17);
        let voiced: Vec<f32> = tone(196.0, 2.0, 0.4)
            .into_iter()
            .zip(noise(SR as usize * 2, 0.003, 23))
            .map(|(t, n)| t + n)
            .collect();
        samples.extend(voiced);

        let report = analyzer().analyze(&SampleBuffer::new(samples, SR)).unwrap();
        assert!((report.avg_frequency_hz - 196.0).abs() < 2.0, "{report:?}");
        assert_eq!(report.range, VoiceRange::Tenor);
        // The noise-only lead-in is gated out
        assert!(report.voiced_windows < report.total_windows);
    }

    #[test]
    fn glitches_are_trimmed() {
        // Steady 150 Hz with a short burst an octave up
        let mut samples = tone(150.0, 2.0, 0.5);
        samples.extend(tone(300.0, 0.1, 0.5));
        samples.extend(tone(150.0, 2.0, 0.5));

        let report = analyzer().analyze(&SampleBuffer::new(samples, SR)).unwrap();
        assert!(report.max_frequency_hz < 160.0, "{report:?}");
        assert_eq!(report.range, VoiceRange::Baritone);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let mut samples = noise(SR as usize / 2, 0.002, 5);
        samples.extend(sweep(120.0, 300.0, 2.0));
        let buffer = SampleBuffer::new(samples, SR);

        let a = analyzer().analyze(&buffer).unwrap();
        let b = analyzer().analyze(&buffer).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn every_strategy_agrees_on_a_steady_tone() {
        for kind in [EstimatorKind::Autocorrelation, EstimatorKind::Yin, EstimatorKind::Mcleod] {
            let cfg = AnalysisConfig {
                estimator: kind,
                ..AnalysisConfig::default()
            };
            let report = BatchAnalyzer::new(cfg)
                .unwrap()
                .analyze(&SampleBuffer::new(tone(246.94, 1.0, 0.5), SR))
                .unwrap();
            assert!(
                (report.avg_frequency_hz - 246.94).abs() < 2.5,
                "{kind:?}: {report:?}"
            );
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let cfg = AnalysisConfig {
            hop_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            BatchAnalyzer::new(cfg),
            Err(VoiceError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn progress_reports_every_window() {
        let buffer = SampleBuffer::new(tone(220.0, 1.0, 0.5), SR);
        let analyzer = analyzer();
        let mut seen = Vec::new();
        analyzer
            .analyze_with_progress(&buffer, |n| seen.push(n))
            .unwrap();
        assert_eq!(seen.len(), analyzer.window_count(buffer.len()));
        assert_eq!(seen.last().copied(), Some(seen.len()));
    }

    #[test]
    fn report_serializes_label() {
        let buffer = SampleBuffer::new(tone(220.0, 1.0, 0.5), SR);
        let report = analyzer().analyze(&buffer).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["range"], "Tenor");
        assert!(json["avg_frequency_hz"].as_f64().is_some());
    }
}
