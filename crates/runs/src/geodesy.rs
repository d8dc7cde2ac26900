//! Great-circle distances along a recorded path.

use crate::models::Position;

/// Mean Earth radius used for all run distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two fixes in kilometers.
///
/// Coordinates are not range-checked; garbage in gives a finite but meaningless
/// distance rather than an error.
pub fn distance_km(a: &Position, b: &Position) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Cumulative distance (km) at each point of the path.
///
/// Index 0 is always 0. An empty path yields an empty profile.
pub fn cumulative_km(path: &[Position]) -> Vec<f64> {
    let Some(_) = path.first() else {
        return Vec::new();
    };

    let mut profile = Vec::with_capacity(path.len());
    profile.push(0.0);
    let mut total = 0.0;
    for pair in path.windows(2) {
        total += distance_km(&pair[0], &pair[1]);
        profile.push(total);
    }
    profile
}

/// Total distance along the path in km; 0 for fewer than two points.
pub fn total_distance_km(path: &[Position]) -> f64 {
    if path.len() < 2 {
        return 0.0;
    }
    path.windows(2)
        .map(|pair| distance_km(&pair[0], &pair[1]))
        .sum()
}
