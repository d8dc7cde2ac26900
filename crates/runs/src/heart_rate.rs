//! Heart rate averaged per completed kilometer.

use crate::{
    geodesy::cumulative_km,
    models::{HeartRateSample, Position, SplitWithHr},
    splits::splits_with_profile,
};

/// Splits of the path annotated with the mean heart rate recorded during each one.
///
/// A kilometer's window runs from the interpolated time at its start to the time at
/// its end, inclusive on both ends. A sample landing exactly on a boundary therefore
/// counts toward both neighbouring kilometers. The per-split mean is not rounded.
pub fn splits_with_heart_rate(
    path: &[Position],
    samples: &[HeartRateSample],
) -> Vec<SplitWithHr> {
    let profile = cumulative_km(path);
    let (splits, boundaries) = splits_with_profile(path, &profile);
    if splits.is_empty() || samples.is_empty() {
        return splits.into_iter().map(SplitWithHr::without_hr).collect();
    }

    splits
        .into_iter()
        .map(|split| {
            let km = split.km as usize;
            let (t_start, t_end) = (boundaries[km - 1], boundaries[km]);
            let (sum, count) = samples
                .iter()
                .filter(|s| {
                    let t = s.timestamp_ms as f64;
                    t >= t_start && t <= t_end
                })
                .fold((0u64, 0u64), |(sum, count), s| (sum + u64::from(s.bpm), count + 1));

            SplitWithHr {
                km: split.km,
                pace_min_per_km: split.pace_min_per_km,
                avg_heart_rate: (count > 0).then(|| sum as f64 / count as f64),
            }
        })
        .collect()
}

/// Mean bpm over all samples, rounded to the nearest integer.
pub fn average_bpm(samples: &[HeartRateSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: u64 = samples.iter().map(|s| u64::from(s.bpm)).sum();
    Some((sum as f64 / samples.len() as f64).round())
}
