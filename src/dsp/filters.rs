//! Whole-buffer cleanup applied once per recording before windowing.
//!
//! Every filter here is pure: it borrows the input and returns a fresh Vec.

use std::f32::consts::PI;

use crate::error::{Result, VoiceError};

/// Single-pole IIR high-pass.
///
///   y[n] = a * (y[n-1] + x[n] - x[n-1]),  a = RC / (RC + dt)
///
/// Removes DC offset and sub-audible rumble (handling noise, HVAC) below
/// `cutoff_hz`. A non-positive cutoff returns the input unchanged.
pub fn high_pass(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> Vec<f32> {
    if cutoff_hz <= 0.0 || samples.is_empty() || sample_rate == 0 {
        return samples.to_vec();
    }

    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    let a = rc / (rc + dt);

    let mut out = Vec::with_capacity(samples.len());
    let mut prev_x = samples[0];
    let mut prev_y = 0.0_f32;
    out.push(prev_y);

    for &x in &samples[1..] {
        let y = a * (prev_y + x - prev_x);
        out.push(y);
        prev_x = x;
        prev_y = y;
    }

    out
}

/// Replace each sample with the median of a centered window.
///
/// Removes isolated clicks and pops without smearing the waveform the way
/// a low-pass would. The window is clamped at the buffer edges. `window_size`
/// must be odd; 1 is the identity.
pub fn median_despike(samples: &[f32], window_size: usize) -> Result<Vec<f32>> {
    if window_size % 2 == 0 {
        return Err(VoiceError::config(format!(
            "median despike window must be odd, got {window_size}"
        )));
    }
    if window_size == 1 || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let half = window_size / 2;
    let mut scratch = Vec::with_capacity(window_size);

    let out = (0..samples.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(samples.len());
            scratch.clear();
            scratch.extend_from_slice(&samples[start..end]);
            scratch.sort_by(|a, b| a.total_cmp(b));
            scratch[scratch.len() / 2]
        })
        .collect();

    Ok(out)
}
