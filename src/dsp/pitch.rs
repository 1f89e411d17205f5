//! Per-window fundamental frequency estimation.
//!
//! One capability (`PitchEstimator`), three interchangeable strategies:
//!
//!   - `AutocorrelationEstimator`: FFT-based normalized autocorrelation with
//!     key-peak picking and parabolic refinement. The default.
//!   - `YinEstimator`: cumulative mean normalized difference with an absolute
//!     threshold (de Cheveigné & Kawahara, 2002).
//!   - `McLeodEstimator`: the McLeod Pitch Method from the `pitch-detection`
//!     crate.
//!
//! All three share the silence early-exit and the vocal bounds check, are
//! deterministic for identical input, and pass the same synthetic-tone
//! suite at the bottom of this file.

use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::PitchDetector;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::util;

/// Amplitude (relative to the window peak) below which leading and
/// trailing samples are trimmed before autocorrelation.
const EDGE_TRIM_RATIO: f32 = 0.1;

/// A normalized autocorrelation peak must reach at least this value to
/// count as periodic.
const MIN_PEAK_CLARITY: f32 = 0.3;

/// The chosen period is the first peak within this fraction of the
/// tallest one. Picking the tallest peak outright lands on multiples of
/// the period (octave errors) whenever the signal is very periodic.
const KEY_PEAK_RATIO: f32 = 0.9;

/// Relative slack on the vocal bounds. Sub-sample refinement of a tone
/// sitting exactly on a bound can land a hair outside it.
const BOUNDS_TOLERANCE: f32 = 0.005;

/// Result of estimating one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchEstimate {
    /// No usable pitch: silence, noise, or a pitch outside the vocal bounds.
    Unvoiced,
    Voiced {
        frequency_hz: f32,
        /// Clarity of the detection, 0.0 to 1.0.
        confidence: f32,
    },
}

impl PitchEstimate {
    pub fn frequency(&self) -> Option<f32> {
        match self {
            PitchEstimate::Voiced { frequency_hz, .. } => Some(*frequency_hz),
            PitchEstimate::Unvoiced => None,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            PitchEstimate::Voiced { confidence, .. } => *confidence,
            PitchEstimate::Unvoiced => 0.0,
        }
    }

    pub fn is_voiced(&self) -> bool {
        matches!(self, PitchEstimate::Voiced { .. })
    }
}

/// Which estimator strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    #[default]
    Autocorrelation,
    Yin,
    Mcleod,
}

/// Parameters shared by every strategy.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Lowest frequency accepted as voice, in Hz.
    pub min_hz: f32,
    /// Highest frequency accepted as voice, in Hz.
    pub max_hz: f32,
    /// Windows quieter than this RMS level (dBFS) are unvoiced without
    /// running the detector.
    pub silence_threshold_db: f32,
    /// YIN absolute threshold on the normalized difference.
    pub yin_threshold: f32,
    /// McLeod power threshold.
    pub mcleod_power_threshold: f64,
    /// McLeod clarity threshold, 0.0 to 1.0.
    pub mcleod_clarity_threshold: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_hz: 60.0,
            max_hz: 1000.0,
            silence_threshold_db: -50.0,
            yin_threshold: 0.15,
            mcleod_power_threshold: 0.2,
            mcleod_clarity_threshold: 0.5,
        }
    }
}

impl EstimatorConfig {
    fn is_silent(&self, window: &[f32]) -> bool {
        util::rms_db(window) < self.silence_threshold_db
    }

    /// Accept estimates within the tolerance of [min_hz, max_hz], reported
    /// clamped to the bounds themselves.
    fn bounded(&self, frequency_hz: f32, confidence: f32) -> PitchEstimate {
        let low = self.min_hz * (1.0 - BOUNDS_TOLERANCE);
        let high = self.max_hz * (1.0 + BOUNDS_TOLERANCE);
        if frequency_hz.is_finite() && frequency_hz >= low && frequency_hz <= high {
            PitchEstimate::Voiced {
                frequency_hz: frequency_hz.clamp(self.min_hz, self.max_hz),
                confidence: confidence.clamp(0.0, 1.0),
            }
        } else {
            PitchEstimate::Unvoiced
        }
    }

    /// Smallest lag worth searching: one sample under the shortest period.
    fn min_lag(&self, sample_rate: u32) -> usize {
        ((sample_rate as f32 / self.max_hz).floor() as usize)
            .saturating_sub(1)
            .max(2)
    }

    /// Largest lag worth searching: a little past the longest period.
    fn max_lag(&self, sample_rate: u32) -> usize {
        (sample_rate as f32 / self.min_hz).ceil() as usize + 2
    }
}

/// Converts one mono window into a pitch estimate.
///
/// Takes `&mut self` so strategies can keep FFT plans and scratch buffers
/// between calls. Implementations must be deterministic.
pub trait PitchEstimator: Send {
    fn estimate(&mut self, window: &[f32], sample_rate: u32) -> PitchEstimate;

    fn name(&self) -> &'static str;
}

/// Build the estimator selected in the config.
pub fn build_estimator(kind: EstimatorKind, config: EstimatorConfig) -> Box<dyn PitchEstimator> {
    match kind {
        EstimatorKind::Autocorrelation => Box::new(AutocorrelationEstimator::new(config)),
        EstimatorKind::Yin => Box::new(YinEstimator::new(config)),
        EstimatorKind::Mcleod => Box::new(McLeodEstimator::new(config)),
    }
}

/// Normalized autocorrelation estimator.
///
/// 1. RMS below the silence threshold → unvoiced.
/// 2. Trim quiet leading/trailing samples.
/// 3. Autocorrelation r(τ) via FFT (Wiener-Khinchin), normalized per lag
///    by the energy of the overlapping segments:
///      n(τ) = 2 r(τ) / Σ (x[j]² + x[j+τ]²)
/// 4. Skip the descending slope from the zero-lag peak, then take the
///    first local peak within `KEY_PEAK_RATIO` of the tallest one.
/// 5. Parabolic interpolation around that peak.
/// 6. f = sample_rate / lag, bounded to [min_hz, max_hz].
pub struct AutocorrelationEstimator {
    config: EstimatorConfig,
    /// Forward and inverse plans for the last padded size seen.
    plans: Option<(usize, Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>)>,
    spectrum: Vec<Complex<f32>>,
    nsdf: Vec<f32>,
}

impl AutocorrelationEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            plans: None,
            spectrum: Vec::new(),
            nsdf: Vec::new(),
        }
    }

    fn plans_for(&mut self, size: usize) -> (Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>) {
        match &self.plans {
            Some((planned, forward, inverse)) if *planned == size => {
                (Arc::clone(forward), Arc::clone(inverse))
            }
            _ => {
                let mut planner = FftPlanner::new();
                let forward = planner.plan_fft_forward(size);
                let inverse = planner.plan_fft_inverse(size);
                self.plans = Some((size, Arc::clone(&forward), Arc::clone(&inverse)));
                (forward, inverse)
            }
        }
    }

    /// Fill `self.nsdf[0..=max_lag]` with the normalized autocorrelation.
    fn compute_nsdf(&mut self, x: &[f32], max_lag: usize) {
        let n = x.len();
        let size = (2 * n).next_power_of_two();

        self.spectrum.clear();
        self.spectrum
            .extend(x.iter().map(|&s| Complex::new(s, 0.0)));
        self.spectrum.resize(size, Complex::new(0.0, 0.0));

        let (forward, inverse) = self.plans_for(size);
        forward.process(&mut self.spectrum);
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        inverse.process(&mut self.spectrum);

        // m(τ) = Σ_{j < n-τ} x[j]² + x[j+τ]², shrunk one term pair per lag
        let mut m: f64 = 2.0 * x.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();

        self.nsdf.clear();
        for tau in 0..=max_lag {
            if tau > 0 {
                let head = x[tau - 1] as f64;
                let tail = x[n - tau] as f64;
                m -= head * head + tail * tail;
            }
            let r = self.spectrum[tau].re as f64 / size as f64;
            let value = if m > 1e-12 { 2.0 * r / m } else { 0.0 };
            self.nsdf.push(value as f32);
        }
    }
}

impl PitchEstimator for AutocorrelationEstimator {
    fn estimate(&mut self, window: &[f32], sample_rate: u32) -> PitchEstimate {
        if window.is_empty() || sample_rate == 0 || self.config.is_silent(window) {
            return PitchEstimate::Unvoiced;
        }

        let trimmed = trim_edges(window, EDGE_TRIM_RATIO);
        let min_lag = self.config.min_lag(sample_rate);
        // Keep at least half the window overlapping at the longest lag.
        let max_lag = self.config.max_lag(sample_rate).min(trimmed.len() / 2);
        if max_lag <= min_lag + 1 {
            return PitchEstimate::Unvoiced;
        }

        self.compute_nsdf(trimmed, max_lag);
        let nsdf = &self.nsdf;

        // Walk down the zero-lag lobe until the curve starts rising again.
        let mut start = 1;
        while start < max_lag && nsdf[start] <= nsdf[start - 1] {
            start += 1;
        }
        let start = start.max(min_lag);

        let peaks: Vec<usize> = (start.max(1)..max_lag)
            .filter(|&t| nsdf[t] > nsdf[t - 1] && nsdf[t] >= nsdf[t + 1])
            .collect();

        let Some(tallest) = peaks
            .iter()
            .map(|&t| nsdf[t])
            .max_by(|a, b| a.total_cmp(b))
        else {
            return PitchEstimate::Unvoiced;
        };

        if tallest < MIN_PEAK_CLARITY {
            return PitchEstimate::Unvoiced;
        }

        let Some(&lag) = peaks.iter().find(|&&t| nsdf[t] >= KEY_PEAK_RATIO * tallest) else {
            return PitchEstimate::Unvoiced;
        };

        let refined = parabolic_peak(nsdf, lag);
        self.config
            .bounded(sample_rate as f32 / refined, nsdf[lag])
    }

    fn name(&self) -> &'static str {
        "autocorrelation"
    }
}

/// YIN estimator.
pub struct YinEstimator {
    config: EstimatorConfig,
    difference: Vec<f32>,
    cmnd: Vec<f32>,
}

impl YinEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            difference: Vec::new(),
            cmnd: Vec::new(),
        }
    }

    /// d(τ) = Σ (x[j] - x[j+τ])² over a fixed integration window, then
    /// d'(τ) = d(τ) * τ / Σ_{k=1..τ} d(k).
    fn compute(&mut self, x: &[f32], max_lag: usize) {
        let window = x.len() - max_lag;

        self.difference.clear();
        self.difference.push(0.0);
        for tau in 1..=max_lag {
            let d: f64 = (0..window)
                .map(|j| {
                    let delta = (x[j] - x[j + tau]) as f64;
                    delta * delta
                })
                .sum();
            self.difference.push(d as f32);
        }

        self.cmnd.clear();
        self.cmnd.push(1.0);
        let mut running = 0.0_f64;
        for tau in 1..=max_lag {
            running += self.difference[tau] as f64;
            let value = if running > 1e-12 {
                self.difference[tau] as f64 * tau as f64 / running
            } else {
                1.0
            };
            self.cmnd.push(value as f32);
        }
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&mut self, window: &[f32], sample_rate: u32) -> PitchEstimate {
        if window.is_empty() || sample_rate == 0 || self.config.is_silent(window) {
            return PitchEstimate::Unvoiced;
        }

        let min_lag = self.config.min_lag(sample_rate);
        let max_lag = self.config.max_lag(sample_rate).min(window.len() / 2);
        if max_lag <= min_lag + 1 {
            return PitchEstimate::Unvoiced;
        }

        self.compute(window, max_lag);
        let cmnd = &self.cmnd;

        // First dip under the threshold, walked down to its local minimum.
        let mut found = None;
        let mut tau = min_lag;
        while tau < max_lag {
            if cmnd[tau] < self.config.yin_threshold {
                while tau + 1 < max_lag && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                found = Some(tau);
                break;
            }
            tau += 1;
        }

        let Some(tau) = found else {
            return PitchEstimate::Unvoiced;
        };

        // The vertex formula is the same for a minimum as for a peak.
        let refined = refine(tau, cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);

        self.config
            .bounded(sample_rate as f32 / refined, 1.0 - cmnd[tau])
    }

    fn name(&self) -> &'static str {
        "yin"
    }
}

/// McLeod Pitch Method via the `pitch-detection` crate.
///
/// The crate's detector keeps its scratch buffers behind `Rc`, so it is
/// built per call rather than stored; the estimator has to stay `Send`.
pub struct McLeodEstimator {
    config: EstimatorConfig,
}

impl McLeodEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }
}

impl PitchEstimator for McLeodEstimator {
    fn estimate(&mut self, window: &[f32], sample_rate: u32) -> PitchEstimate {
        if window.is_empty() || sample_rate == 0 || self.config.is_silent(window) {
            return PitchEstimate::Unvoiced;
        }

        let size = window.len();
        let mut detector = McLeodDetector::new(size, size / 2);

        let signal: Vec<f64> = window.iter().map(|&s| s as f64).collect();
        let pitch = detector.get_pitch(
            &signal,
            sample_rate as usize,
            self.config.mcleod_power_threshold,
            self.config.mcleod_clarity_threshold,
        );

        match pitch {
            Some(p) => self.config.bounded(p.frequency as f32, p.clarity as f32),
            None => PitchEstimate::Unvoiced,
        }
    }

    fn name(&self) -> &'static str {
        "mcleod"
    }
}

/// Drop leading and trailing samples quieter than `ratio` of the window peak.
fn trim_edges(window: &[f32], ratio: f32) -> &[f32] {
    let peak = window.iter().fold(0.0_f32, |m, &s| m.max(s.abs()));
    let threshold = peak * ratio;
    let first = window.iter().position(|s| s.abs() >= threshold);
    let last = window.iter().rposition(|s| s.abs() >= threshold);
    match (first, last) {
        (Some(first), Some(last)) if first <= last => &window[first..=last],
        _ => window,
    }
}

/// Sub-sample position of the peak at `lag` in `curve`.
fn parabolic_peak(curve: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag + 1 >= curve.len() {
        return lag as f32;
    }
    refine(lag, curve[lag - 1], curve[lag], curve[lag + 1])
}

/// Vertex of the parabola through (lag-1, a), (lag, b), (lag+1, c).
/// Falls back to the integer lag when the points are collinear.
fn refine(lag: usize, a: f32, b: f32, c: f32) -> f32 {
    let denom = a - 2.0 * b + c;
    if denom.abs() < 1e-12 {
        return lag as f32;
    }
    let shift = 0.5 * (a - c) / denom;
    if shift.abs() > 1.0 {
        return lag as f32;
    }
    lag as f32 + shift
}
