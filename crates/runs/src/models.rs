use geo::geometry::Point;
use serde::{Deserialize, Serialize};

/// A single GPS fix on the run path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }

    /// Returns true if both positions have bit-identical coordinates.
    pub fn same_coordinates(&self, other: &Position) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// The fix as a `geo` point (x = longitude, y = latitude).
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A heart rate reading with the time it was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub bpm: u16,
}

impl HeartRateSample {
    pub fn new(timestamp_ms: i64, bpm: u16) -> Self {
        Self { timestamp_ms, bpm }
    }
}

/// Pace over one completed kilometer. Kilometer `km` covers `(km - 1, km]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KmSplit {
    pub km: u32,
    pub pace_min_per_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitWithHr {
    pub km: u32,
    pub pace_min_per_km: f64,
    pub avg_heart_rate: Option<f64>,
}

impl SplitWithHr {
    pub fn without_hr(split: KmSplit) -> Self {
        Self {
            km: split.km,
            pace_min_per_km: split.pace_min_per_km,
            avg_heart_rate: None,
        }
    }
}

/// A finished run ready to be handed to a [`RunStore`](crate::store::RunStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInsert {
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub pace_min_per_km: f64,
    pub avg_heart_rate: Option<f64>,
    pub path: Vec<Position>,
    pub heart_rate_samples: Vec<HeartRateSample>,
}

/// A persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub pace_min_per_km: f64,
    pub avg_heart_rate: Option<f64>,
    pub path: Vec<Position>,
    pub heart_rate_samples: Vec<HeartRateSample>,
}

impl Run {
    pub fn from_insert(id: i64, run: RunInsert) -> Self {
        Self {
            id,
            start_time_ms: run.start_time_ms,
            end_time_ms: run.end_time_ms,
            distance_km: run.distance_km,
            duration_seconds: run.duration_seconds,
            pace_min_per_km: run.pace_min_per_km,
            avg_heart_rate: run.avg_heart_rate,
            path: run.path,
            heart_rate_samples: run.heart_rate_samples,
        }
    }
}

/// Lifecycle of the live recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Recording => "recording",
            RunStatus::Paused => "paused",
            RunStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
