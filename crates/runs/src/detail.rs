//! Post-run analytics for a stored run.

use serde::Serialize;

use crate::{
    heart_rate::{average_bpm, splits_with_heart_rate},
    models::{Run, SplitWithHr},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    pub id: i64,
    pub start_time_ms: i64,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub avg_pace_min_per_km: f64,
    pub avg_bpm: Option<f64>,
    pub splits: Vec<SplitWithHr>,
}

impl RunDetail {
    pub fn from_run(run: &Run) -> Self {
        Self {
            id: run.id,
            start_time_ms: run.start_time_ms,
            distance_km: run.distance_km,
            duration_seconds: run.duration_seconds,
            avg_pace_min_per_km: run.pace_min_per_km,
            // Older rows may lack the stored average; recompute from the samples.
            avg_bpm: run
                .avg_heart_rate
                .or_else(|| average_bpm(&run.heart_rate_samples)),
            splits: splits_with_heart_rate(&run.path, &run.heart_rate_samples),
        }
    }

    /// Fastest full kilometre, if any.
    pub fn best_split(&self) -> Option<&SplitWithHr> {
        self.splits
            .iter()
            .filter(|s| s.pace_min_per_km > 0.0)
            .min_by(|a, b| a.pace_min_per_km.total_cmp(&b.pace_min_per_km))
    }
}
