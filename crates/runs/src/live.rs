//! In-memory state of the run being recorded.
//!
//! [`LiveRunState`] only knows the lifecycle rules and the trace; feeds, timers and
//! persistence are driven by the [`recorder`](crate::recorder) around it.

use serde::Serialize;

use crate::{
    format::format_clock,
    geodesy::total_distance_km,
    heart_rate::average_bpm,
    models::{HeartRateSample, Position, RunInsert, RunStatus},
    notification::timer_label,
    splits::current_split_pace,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveRunState {
    pub status: RunStatus,
    pub start_time_ms: Option<i64>,
    pub elapsed_seconds: u64,
    pub path: Vec<Position>,
    pub heart_rate_samples: Vec<HeartRateSample>,
    pub current_bpm: Option<u16>,
}

/// Metrics derived from the live trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMetrics {
    pub status: RunStatus,
    pub elapsed_seconds: u64,
    pub formatted_time: String,
    pub distance_km: f64,
    pub current_split_pace_min_per_km: Option<f64>,
    pub avg_pace_min_per_km: Option<f64>,
    pub current_bpm: Option<u16>,
    pub avg_bpm: Option<f64>,
}

impl LiveRunState {
    /// Idle → Recording. Returns false (and changes nothing) from any other status.
    pub fn begin(&mut self, start_time_ms: i64, seed: Option<Position>) -> bool {
        if self.status != RunStatus::Idle {
            return false;
        }
        *self = Self {
            status: RunStatus::Recording,
            start_time_ms: Some(start_time_ms),
            path: seed.into_iter().collect(),
            ..Self::default()
        };
        true
    }

    /// Appends a fix unless it repeats the last fix's coordinates.
    pub fn ingest_position(&mut self, position: Position) -> bool {
        if self.status != RunStatus::Recording {
            return false;
        }
        if self
            .path
            .last()
            .is_some_and(|last| last.same_coordinates(&position))
        {
            return false;
        }
        self.path.push(position);
        true
    }

    pub fn ingest_heart_rate(&mut self, sample: HeartRateSample) -> bool {
        if self.status != RunStatus::Recording {
            return false;
        }
        self.current_bpm = Some(sample.bpm);
        self.heart_rate_samples.push(sample);
        true
    }

    pub fn tick(&mut self) -> bool {
        if self.status != RunStatus::Recording {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.status != RunStatus::Recording {
            return false;
        }
        self.status = RunStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != RunStatus::Paused {
            return false;
        }
        self.status = RunStatus::Recording;
        true
    }

    /// Recording|Paused → Stopped → Idle.
    ///
    /// Always leaves the state reset to Idle. Returns the finished run when there is
    /// a trace worth keeping.
    pub fn finish(&mut self, end_time_ms: i64) -> Option<RunInsert> {
        if !matches!(self.status, RunStatus::Recording | RunStatus::Paused) {
            return None;
        }
        self.status = RunStatus::Stopped;
        let stopped = std::mem::take(self);

        let start_time_ms = stopped.start_time_ms?;
        if stopped.path.is_empty() {
            return None;
        }

        let distance_km = total_distance_km(&stopped.path);
        let pace_min_per_km = if distance_km > 0.0 {
            (stopped.elapsed_seconds as f64 / 60.0) / distance_km
        } else {
            0.0
        };
        Some(RunInsert {
            start_time_ms,
            end_time_ms,
            distance_km,
            duration_seconds: stopped.elapsed_seconds,
            pace_min_per_km,
            avg_heart_rate: average_bpm(&stopped.heart_rate_samples),
            path: stopped.path,
            heart_rate_samples: stopped.heart_rate_samples,
        })
    }

    /// Notification text, or `None` when nothing should be shown.
    pub fn notification_label(&self) -> Option<String> {
        match self.status {
            RunStatus::Recording | RunStatus::Paused if self.elapsed_seconds > 0 => Some(
                timer_label(self.elapsed_seconds, self.status == RunStatus::Paused),
            ),
            _ => None,
        }
    }

    pub fn metrics(&self) -> LiveMetrics {
        let distance_km = total_distance_km(&self.path);
        let avg_pace_min_per_km =
            (distance_km > 0.0).then(|| (self.elapsed_seconds as f64 / 60.0) / distance_km);
        LiveMetrics {
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            formatted_time: format_clock(self.elapsed_seconds),
            distance_km,
            current_split_pace_min_per_km: current_split_pace(&self.path),
            avg_pace_min_per_km,
            current_bpm: self.current_bpm,
            avg_bpm: average_bpm(&self.heart_rate_samples),
        }
    }
}
