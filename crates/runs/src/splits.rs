//! Per-kilometer pace splits.

use crate::{
    geodesy::cumulative_km,
    interpolation::{kilometer_boundaries, time_at_distance},
    models::{KmSplit, Position},
};

/// Distance below which the current split is treated as GPS jitter.
pub const CURRENT_SPLIT_NOISE_FLOOR_KM: f64 = 0.01;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Completed kilometer splits of the path.
///
/// The cumulative profile is computed once and shared by every boundary lookup.
pub fn splits_from_path(path: &[Position]) -> Vec<KmSplit> {
    let profile = cumulative_km(path);
    splits_with_profile(path, &profile).0
}

/// Splits together with the boundary times they were derived from.
///
/// `boundaries[k]` is the time at kilometer `k`, so split `km` spans
/// `boundaries[km - 1]..=boundaries[km]`.
pub(crate) fn splits_with_profile(path: &[Position], profile: &[f64]) -> (Vec<KmSplit>, Vec<f64>) {
    if path.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let total_km = profile.last().copied().unwrap_or(0.0);
    let full_kms = total_km.floor() as u32;
    if full_kms < 1 {
        return (Vec::new(), Vec::new());
    }

    let boundaries = kilometer_boundaries(path, profile, full_kms);
    let splits = boundaries
        .windows(2)
        .zip(1..)
        .map(|(pair, km)| KmSplit {
            km,
            pace_min_per_km: (pair[1] - pair[0]) / MS_PER_MINUTE,
        })
        .collect();
    (splits, boundaries)
}

/// Pace (min/km) of the incomplete trailing kilometer.
///
/// `None` when there is not enough distance to be meaningful: fewer than two fixes,
/// less than [`CURRENT_SPLIT_NOISE_FLOOR_KM`] in total, or the path ends exactly on a
/// kilometer boundary.
pub fn current_split_pace(path: &[Position]) -> Option<f64> {
    if path.len() < 2 {
        return None;
    }
    let profile = cumulative_km(path);
    let total_km = profile.last().copied()?;
    if total_km < CURRENT_SPLIT_NOISE_FLOOR_KM {
        return None;
    }

    let km_start = total_km.floor();
    let start_ms = if km_start < 1.0 {
        path[0].timestamp_ms as f64
    } else {
        time_at_distance(path, &profile, km_start)
    };
    let segment_km = total_km - km_start;
    if segment_km <= 0.0 {
        return None;
    }

    let end_ms = path[path.len() - 1].timestamp_ms as f64;
    Some((end_ms - start_ms) / MS_PER_MINUTE / segment_km)
}
