//! Procedural run trace generation.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use runs::{
    geodesy::total_distance_km,
    heart_rate::average_bpm,
    models::{HeartRateSample, Position, RunInsert},
};

use crate::config::{BoundingBox, Region};
use crate::profiles::{RunnerProfile, sample_variance};

/// Metres per degree of latitude, close enough for laying out a walk.
const METERS_PER_DEGREE: f64 = 111_195.0;

/// Configuration for procedural trace generation.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Target distance in kilometres (of the underlying walk, before jitter).
    pub distance_km: f64,
    /// Starting point (lat, lon). If None, random within bounds.
    pub start_point: Option<(f64, f64)>,
    /// Area a random start point is drawn from.
    pub bounds: BoundingBox,
    /// Timestamp of the first fix.
    pub start_time_ms: i64,
    /// Seconds between GPS fixes.
    pub fix_interval_s: f64,
    /// GPS position jitter standard deviation in metres.
    pub gps_jitter_m: f64,
    /// Probability that a fix repeats the previous coordinates (runner standing).
    pub duplicate_probability: f64,
    /// Seconds between heart rate samples; `None` for a run without a monitor.
    pub heart_rate_interval_s: Option<f64>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            distance_km: 5.0,
            start_point: None,
            bounds: Region::BOULDER,
            start_time_ms: 1_735_725_600_000, // 2025-01-01T10:00:00Z
            fix_interval_s: 5.0,
            gps_jitter_m: 2.0,
            duplicate_probability: 0.03,
            heart_rate_interval_s: Some(5.0),
        }
    }
}

/// Raw feed output for one run: every fix as a position feed would report it,
/// stationary duplicates included.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRun {
    pub path: Vec<Position>,
    pub heart_rate_samples: Vec<HeartRateSample>,
}

impl GeneratedRun {
    /// The path as the recorder keeps it, with repeated coordinates collapsed.
    pub fn recorded_path(&self) -> Vec<Position> {
        let mut path: Vec<Position> = Vec::with_capacity(self.path.len());
        for fix in &self.path {
            if path.last().is_some_and(|last| last.same_coordinates(fix)) {
                continue;
            }
            path.push(*fix);
        }
        path
    }

    /// A finished run as the recorder would produce it, assuming no pauses.
    pub fn to_run_insert(&self) -> RunInsert {
        let path = self.recorded_path();
        let start_time_ms = self.path.first().map_or(0, |p| p.timestamp_ms);
        let end_time_ms = self.path.last().map_or(0, |p| p.timestamp_ms);
        let duration_seconds = u64::try_from((end_time_ms - start_time_ms) / 1000).unwrap_or(0);
        let distance_km = total_distance_km(&path);
        let pace_min_per_km = if distance_km > 0.0 {
            (duration_seconds as f64 / 60.0) / distance_km
        } else {
            0.0
        };
        RunInsert {
            start_time_ms,
            end_time_ms,
            distance_km,
            duration_seconds,
            pace_min_per_km,
            avg_heart_rate: average_bpm(&self.heart_rate_samples),
            path,
            heart_rate_samples: self.heart_rate_samples.clone(),
        }
    }
}

/// Generates synthetic run traces with GPS noise and heart rate.
#[derive(Debug, Clone, Default)]
pub struct ProceduralTrace {
    config: TraceConfig,
}

impl ProceduralTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TraceConfig) -> Self {
        Self { config }
    }

    pub fn with_distance(mut self, km: f64) -> Self {
        self.config.distance_km = km;
        self
    }

    pub fn with_start(mut self, lat: f64, lon: f64) -> Self {
        self.config.start_point = Some((lat, lon));
        self
    }

    pub fn with_start_time(mut self, start_time_ms: i64) -> Self {
        self.config.start_time_ms = start_time_ms;
        self
    }

    pub fn with_gps_jitter(mut self, meters: f64) -> Self {
        self.config.gps_jitter_m = meters;
        self
    }

    pub fn with_duplicates(mut self, probability: f64) -> Self {
        self.config.duplicate_probability = probability;
        self
    }

    pub fn without_heart_rate(mut self) -> Self {
        self.config.heart_rate_interval_s = None;
        self
    }

    /// Generates one run timed by `profile`.
    pub fn generate(&self, profile: &RunnerProfile, rng: &mut impl Rng) -> GeneratedRun {
        let config = &self.config;
        let (mut lat, mut lon) = config
            .start_point
            .unwrap_or_else(|| config.bounds.random_point(rng));
        let jitter = Normal::new(0.0, config.gps_jitter_m / METERS_PER_DEGREE)
            .ok()
            .filter(|_| config.gps_jitter_m > 0.0);
        let target_m = config.distance_km * 1000.0;
        let interval_ms = (config.fix_interval_s * 1000.0).round() as i64;

        let mut heading = rng.gen_range(0.0..std::f64::consts::TAU);
        let mut walked_m = 0.0;
        let mut elapsed_ms = 0_i64;
        let mut next_hr_ms = 0_i64;
        let mut speed = profile.base_speed_mps();

        let mut path = Vec::new();
        let mut samples = Vec::new();
        let (fix_lat, fix_lon) = jittered(jitter.as_ref(), lat, lon, rng);
        path.push(Position::new(fix_lat, fix_lon, config.start_time_ms));

        while walked_m < target_m {
            elapsed_ms += interval_ms;
            let timestamp_ms = config.start_time_ms + elapsed_ms;

            if let Some(last) = path.last().copied()
                && rng.r#gen::<f64>() < config.duplicate_probability
            {
                path.push(Position::new(last.latitude, last.longitude, timestamp_ms));
            } else {
                speed = profile.base_speed_mps() * sample_variance(profile.variance(), rng);
                let step = (speed * config.fix_interval_s).min(target_m - walked_m);
                heading += rng.gen_range(-0.25..0.25);
                lat += step * heading.cos() / METERS_PER_DEGREE;
                lon += step * heading.sin() / (METERS_PER_DEGREE * lat.to_radians().cos());
                walked_m += step;

                let (fix_lat, fix_lon) = jittered(jitter.as_ref(), lat, lon, rng);
                path.push(Position::new(fix_lat, fix_lon, timestamp_ms));
            }

            if let Some(hr_interval_s) = config.heart_rate_interval_s {
                while next_hr_ms <= elapsed_ms {
                    let bpm = profile.heart_rate_at(speed, next_hr_ms as f64 / 1000.0);
                    let noise = rng.gen_range(-2..=2_i32);
                    let bpm = (i32::from(bpm) + noise).clamp(30, 220) as u16;
                    samples.push(HeartRateSample::new(config.start_time_ms + next_hr_ms, bpm));
                    next_hr_ms += (hr_interval_s * 1000.0).round().max(1.0) as i64;
                }
            }
        }

        GeneratedRun {
            path,
            heart_rate_samples: samples,
        }
    }
}

fn jittered(jitter: Option<&Normal<f64>>, lat: f64, lon: f64, rng: &mut impl Rng) -> (f64, f64) {
    match jitter {
        Some(normal) => (lat + normal.sample(rng), lon + normal.sample(rng)),
        None => (lat, lon),
    }
}
