//! Runner athletic profile.

/// Pace and heart rate model of a runner.
///
/// Heart rate climbs from resting toward threshold as speed approaches the runner's
/// base speed, plus a slow drift over the run.
#[derive(Debug, Clone)]
pub struct RunnerProfile {
    /// Base speed in m/s on flat ground.
    base_speed: f64,
    /// Fix-to-fix speed variation (coefficient of variation).
    variance: f64,
    pub resting_bpm: u16,
    pub threshold_bpm: u16,
}

impl Default for RunnerProfile {
    fn default() -> Self {
        Self {
            base_speed: 1000.0 / 330.0, // 5:30/km
            variance: 0.08,
            resting_bpm: 60,
            threshold_bpm: 172,
        }
    }
}

impl RunnerProfile {
    /// Creates a runner with the given base pace in minutes per kilometre.
    pub fn with_pace(pace_min_per_km: f64) -> Self {
        Self {
            base_speed: 1000.0 / (pace_min_per_km * 60.0),
            ..Default::default()
        }
    }

    /// ~3:30/km.
    pub fn elite() -> Self {
        Self {
            resting_bpm: 45,
            threshold_bpm: 178,
            variance: 0.04,
            ..Self::with_pace(3.5)
        }
    }

    /// ~6:30/km.
    pub fn recreational() -> Self {
        Self {
            variance: 0.12,
            ..Self::with_pace(6.5)
        }
    }

    pub fn with_variance(mut self, variance: f64) -> Self {
        self.variance = variance;
        self
    }

    pub fn base_speed_mps(&self) -> f64 {
        self.base_speed
    }

    pub fn base_pace_min_per_km(&self) -> f64 {
        1000.0 / self.base_speed / 60.0
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Heart rate at `speed_mps` after `elapsed_s` seconds of running.
    pub fn heart_rate_at(&self, speed_mps: f64, elapsed_s: f64) -> u16 {
        let effort = (speed_mps / self.base_speed).clamp(0.0, 1.3);
        let reserve = f64::from(self.threshold_bpm - self.resting_bpm);
        // Cardiac drift: about 5 bpm per half hour.
        let drift = elapsed_s / 1800.0 * 5.0;
        let bpm = f64::from(self.resting_bpm) + reserve * (0.55 + 0.35 * effort) + drift;
        bpm.round().clamp(f64::from(self.resting_bpm), 220.0) as u16
    }
}
