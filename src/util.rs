/// RMS of a sample buffer (linear, not dB). Returns 0.0 for empty input.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Convert a linear amplitude to dBFS. Zero maps to -infinity.
pub fn to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f32::NEG_INFINITY
    }
}

/// Convert dBFS back to a linear amplitude.
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// RMS level in dB (relative to full scale).
/// Returns -infinity for all-zero or empty input.
pub fn rms_db(samples: &[f32]) -> f32 {
    to_db(rms(samples))
}

/// Peak amplitude in dB (relative to full scale).
/// Returns -infinity for all-zero input.
pub fn peak_db(samples: &[f32]) -> f32 {
    let peak = samples
        .iter()
        .fold(0.0_f32, |max, &s| max.max(s.abs()));
    to_db(peak)
}

/// Fraction of adjacent sample pairs whose sign differs.
///
/// Tonal voice sits well under 0.1 at typical sample rates; broadband
/// hiss approaches 0.5. Exact zeros count as positive so digital silence
/// does not register as crossings.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_db_full_scale() {
        let samples = vec![0.0, 0.5, 1.0, -0.5];
        assert!((peak_db(&samples) - 0.0).abs() < 0.01);
    }

    #[test]
    fn peak_db_silence() {
        let samples = vec![0.0, 0.0, 0.0];
        assert!(peak_db(&samples).is_infinite());
        assert!(peak_db(&samples).is_sign_negative());
    }

    #[test]
    fn rms_known_value() {
        assert!((rms(&[1.0, -1.0]) - 1.0).abs() < 0.001);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_db_half_scale_dc() {
        // Constant 0.5 → RMS = 0.5 → -6.02 dB
        let samples = vec![0.5, 0.5, 0.5, 0.5];
        assert!((rms_db(&samples) - (-6.02)).abs() < 0.1);
    }

    #[test]
    fn rms_db_empty() {
        assert!(rms_db(&[]).is_infinite());
    }

    #[test]
    fn db_roundtrip() {
        let lin = db_to_linear(-20.0);
        assert!((lin - 0.1).abs() < 1e-6);
        assert!((to_db(lin) + 20.0).abs() < 1e-4);
    }

    #[test]
    fn zcr_alternating_is_one() {
        let samples = vec![1.0, -1.0, 1.0, -1.0, 1.0];
        assert!((zero_crossing_rate(&samples) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zcr_silence_is_zero() {
        assert_eq!(zero_crossing_rate(&[0.0; 64]), 0.0);
        assert_eq!(zero_crossing_rate(&[0.3]), 0.0);
    }

    #[test]
    fn zcr_low_tone() {
        // 100 Hz at 48 kHz crosses zero 200 times per second
        let sr = 48000.0;
        let samples: Vec<f32> = (0..48000)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / sr).sin())
            .collect();
        let zcr = zero_crossing_rate(&samples);
        assert!((zcr - 200.0 / 48000.0).abs() < 0.001, "got {zcr}");
    }
}
