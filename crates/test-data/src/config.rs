//! Configuration types for test data generation.

use serde::{Deserialize, Serialize};

/// Geographic bounding box defined by southwest and northeast corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum latitude (south)
    pub min_lat: f64,
    /// Minimum longitude (west)
    pub min_lon: f64,
    /// Maximum latitude (north)
    pub max_lat: f64,
    /// Maximum longitude (east)
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Returns a random point within the bounding box.
    pub fn random_point(&self, rng: &mut impl rand::Rng) -> (f64, f64) {
        let lat = rng.gen_range(self.min_lat..self.max_lat);
        let lon = rng.gen_range(self.min_lon..self.max_lon);
        (lat, lon)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Pre-defined areas runs are generated in.
#[derive(Debug, Clone, Copy)]
pub struct Region;

impl Region {
    /// Boulder, CO: foothills trails and long flat bike paths.
    pub const BOULDER: BoundingBox = BoundingBox::new(39.9, -105.5, 40.1, -105.2);

    /// Central Park loop area.
    pub const CENTRAL_PARK: BoundingBox = BoundingBox::new(40.764, -73.982, 40.800, -73.949);
}

/// Configuration for the `seed` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Number of runs to generate.
    pub run_count: usize,

    /// Distance range for each run, in kilometres.
    pub distance_km: (f64, f64),

    /// Where runs start.
    pub region: BoundingBox,

    /// RNG seed, so repeated seeding produces the same history.
    pub seed: u64,

    /// Days between consecutive runs.
    pub days_between_runs: i64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            run_count: 20,
            distance_km: (3.0, 12.0),
            region: Region::BOULDER,
            seed: 12345,
            days_between_runs: 2,
        }
    }
}
