use std::f32::consts::PI;

/// Periodic Hann coefficients of length `n`.
///
/// The Hann window smoothly tapers a frame of audio to zero at its start,
/// which keeps the magnitude spectrum free of the leakage an abrupt cut
/// would add. The periodic form (N in the denominator rather than N - 1)
/// makes consecutive windows at 50% overlap sum to exactly 1.0, so
/// overlap-add reconstruction needs no extra normalization.
///
/// Formula: w(n) = 0.5 * (1 - cos(2π * n / N))
pub fn periodic_hann(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    let scale = 2.0 * PI / n as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (scale * i as f32).cos()))
        .collect()
}
