//! Spectral subtraction noise suppression.
//!
//! The noise spectrum is learned from the quiet blocks at the start of a
//! recording, then subtracted from every frame of the recording in the
//! magnitude domain. Phase is kept as-is and frames are stitched back with
//! 50% overlap-add of a periodic Hann window.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use tracing::debug;

use super::windowing;
use crate::util;

/// Frame length for the STFT used by suppression and profiling.
pub const SUPPRESSION_FRAME_SIZE: usize = 1024;

const HOP: usize = SUPPRESSION_FRAME_SIZE / 2;

/// Average magnitude spectrum of background noise, one value per FFT bin.
///
/// Built once per recording and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseProfile {
    magnitudes: Vec<f32>,
    frames: usize,
}

impl NoiseProfile {
    /// Estimate the noise spectrum from the opening of a recording.
    ///
    /// Only blocks within the first `lead_secs` whose RMS sits below
    /// `floor_db` contribute. Returns `None` when no block qualifies, which
    /// is what happens when the singer starts right away.
    pub fn estimate(
        samples: &[f32],
        sample_rate: u32,
        lead_secs: f32,
        floor_db: f32,
    ) -> Option<NoiseProfile> {
        let lead = ((lead_secs.max(0.0) * sample_rate as f32) as usize).min(samples.len());
        let window = windowing::periodic_hann(SUPPRESSION_FRAME_SIZE);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(SUPPRESSION_FRAME_SIZE);

        let mut sum = vec![0.0_f32; SUPPRESSION_FRAME_SIZE];
        let mut frames = 0;
        let mut pos = 0;

        while pos + SUPPRESSION_FRAME_SIZE <= lead {
            let block = &samples[pos..pos + SUPPRESSION_FRAME_SIZE];
            if util::rms_db(block) < floor_db {
                let mut spectrum: Vec<Complex<f32>> = block
                    .iter()
                    .zip(&window)
                    .map(|(&s, &w)| Complex::new(s * w, 0.0))
                    .collect();
                fft.process(&mut spectrum);
                for (acc, bin) in sum.iter_mut().zip(&spectrum) {
                    *acc += bin.norm();
                }
                frames += 1;
            }
            pos += HOP;
        }

        if frames == 0 {
            return None;
        }

        let magnitudes = sum.into_iter().map(|m| m / frames as f32).collect();
        debug!(frames, lead_samples = lead, "estimated noise profile");
        Some(NoiseProfile { magnitudes, frames })
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Number of quiet blocks the profile was averaged over.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

/// Subtract `alpha` times the noise magnitude from each bin, flooring the
/// result at `beta` times the original magnitude so bins never go negative
/// and "musical noise" stays bounded.
pub fn spectral_noise_suppress(
    samples: &[f32],
    profile: &NoiseProfile,
    alpha: f32,
    beta: f32,
) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let n = SUPPRESSION_FRAME_SIZE;
    let window = windowing::periodic_hann(n);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    // Pad half a frame on both sides so every real sample is covered by two
    // frames whose windows sum to 1.
    let mut padded = vec![0.0_f32; HOP];
    padded.extend_from_slice(samples);
    let frame_count = padded.len().div_ceil(HOP) + 1;
    padded.resize(frame_count * HOP + n, 0.0);

    let mut output = vec![0.0_f32; padded.len()];
    let mut spectrum = vec![Complex::new(0.0_f32, 0.0); n];

    for frame in 0..frame_count {
        let start = frame * HOP;
        for (i, bin) in spectrum.iter_mut().enumerate() {
            *bin = Complex::new(padded[start + i] * window[i], 0.0);
        }

        fft.process(&mut spectrum);

        for (bin, &noise) in spectrum.iter_mut().zip(profile.magnitudes()) {
            let magnitude = bin.norm();
            if magnitude <= 0.0 {
                continue;
            }
            let cleaned = (magnitude - alpha * noise).max(beta * magnitude);
            *bin *= cleaned / magnitude;
        }

        ifft.process(&mut spectrum);

        // rustfft does not normalize the inverse transform
        let scale = 1.0 / n as f32;
        for (i, bin) in spectrum.iter().enumerate() {
            output[start + i] += bin.re * scale;
        }
    }

    output[HOP..HOP + samples.len()].to_vec()
}
