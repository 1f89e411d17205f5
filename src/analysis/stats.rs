/// Sort frequencies ascending. NaNs never reach here, but `total_cmp`
/// keeps the order total regardless.
pub fn sorted(values: &[f32]) -> Vec<f32> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Drop `fraction / 2` of the values from each end of a sorted slice.
///
/// We trim instead of taking raw min/max so that a stray octave jump or a
/// voice crack doesn't set the range. Never trims everything: when the
/// tails would meet, the whole slice is returned.
pub fn trim_tails(sorted: &[f32], fraction: f32) -> &[f32] {
    let per_tail = (sorted.len() as f32 * fraction.max(0.0) / 2.0).floor() as usize;
    if per_tail * 2 >= sorted.len() {
        return sorted;
    }
    &sorted[per_tail..sorted.len() - per_tail]
}

pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Some((sum / values.len() as f64) as f32)
}

/// Percentile of a sorted slice. `p` is in [0.0, 1.0].
pub fn percentile(sorted: &[f32], p: f32) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let idx = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f32).round() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_both_tails_evenly() {
        let data: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let kept = trim_tails(&data, 0.2);
        assert_eq!(kept.len(), 80);
        assert_eq!(kept[0], 10.0);
        assert_eq!(kept[79], 89.0);
    }

    #[test]
    fn tiny_sets_are_not_emptied() {
        assert_eq!(trim_tails(&[150.0], 0.15), &[150.0]);
        assert_eq!(trim_tails(&[150.0, 160.0], 0.9), &[150.0, 160.0]);
    }

    #[test]
    fn zero_fraction_keeps_all() {
        let data = [1.0, 2.0, 3.0];
        assert_eq!(trim_tails(&data, 0.0), &data);
    }

    #[test]
    fn outliers_do_not_move_the_mean() {
        let mut data = vec![200.0; 18];
        data.push(50.0); // mic bump
        data.push(800.0); // crack
        let data = sorted(&data);
        let kept = trim_tails(&data, 0.15);
        assert_eq!(mean(kept), Some(200.0));
    }

    #[test]
    fn mean_and_percentile() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));

        let data: Vec<f32> = (0..101).map(|i| i as f32).collect();
        assert_eq!(percentile(&data, 0.5), Some(50.0));
        assert_eq!(percentile(&data, 1.0), Some(100.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn sort_is_ascending() {
        assert_eq!(sorted(&[3.0, 1.0, 2.0]), vec![1.0, 2.0, 3.0]);
    }
}
