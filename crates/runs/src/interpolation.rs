//! Time-at-distance lookups along a recorded path.
//!
//! Both the live "current kilometer" pace and the historical per-kilometer splits go
//! through [`time_at_distance`], so a live reading and the stored split for the same
//! kilometer are computed the same way.

use crate::models::Position;

/// Timestamp (ms) at which the path reaches `target_km` of cumulative distance.
///
/// `profile` must be the [`cumulative_km`](crate::geodesy::cumulative_km) of `path`.
/// Targets at or below zero give the first timestamp; targets past the end are
/// clamped to the last timestamp. A zero-length bracketing segment resolves to the
/// segment's start time. An empty path gives 0.
pub fn time_at_distance(path: &[Position], profile: &[f64], target_km: f64) -> f64 {
    let Some(first) = path.first() else {
        return 0.0;
    };
    if target_km <= 0.0 || path.len() < 2 {
        return first.timestamp_ms as f64;
    }

    let len = path.len().min(profile.len());
    match (1..len).find(|&i| profile[i] >= target_km) {
        Some(i) => interpolate(path, profile, i, target_km),
        None => path[path.len() - 1].timestamp_ms as f64,
    }
}

/// Timestamps at each whole-kilometer boundary `0..=full_kms`.
///
/// Equivalent to calling [`time_at_distance`] for every boundary, but walks the path
/// once: boundaries increase, so the bracket search resumes where the last one ended.
pub fn kilometer_boundaries(path: &[Position], profile: &[f64], full_kms: u32) -> Vec<f64> {
    let mut out = Vec::with_capacity(full_kms as usize + 1);
    let Some(first) = path.first() else {
        return out;
    };
    out.push(first.timestamp_ms as f64);

    let len = path.len().min(profile.len());
    let mut cursor = 1;
    for km in 1..=full_kms {
        let target = f64::from(km);
        while cursor < len && profile[cursor] < target {
            cursor += 1;
        }
        if cursor < len {
            out.push(interpolate(path, profile, cursor, target));
        } else {
            out.push(path[path.len() - 1].timestamp_ms as f64);
        }
    }
    out
}

/// Linear interpolation inside the segment ending at index `i` (`i >= 1`).
fn interpolate(path: &[Position], profile: &[f64], i: usize, target_km: f64) -> f64 {
    let (d0, d1) = (profile[i - 1], profile[i]);
    let t0 = path[i - 1].timestamp_ms as f64;
    let t1 = path[i].timestamp_ms as f64;
    let span = d1 - d0;
    if span <= 0.0 {
        return t0;
    }
    t0 + ((target_km - d0) / span) * (t1 - t0)
}
