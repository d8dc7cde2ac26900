//! Recorder configuration.

use std::{env, time::Duration};

use serde::{Deserialize, Serialize};

/// Default database location used by the binaries.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://runs.db?mode=rwc";

/// Tunables for the live recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Window within which a repeated notification action is dropped.
    pub dedupe_window_ms: u64,
    /// Elapsed-time tick period.
    pub tick_interval_ms: u64,
    /// Upper bound on opening or closing a feed subscription.
    pub feed_timeout_ms: u64,
    /// Upper bound on a single notification channel call.
    pub notification_timeout_ms: u64,
    /// How long a heart rate device scan runs.
    pub hr_scan_timeout_ms: u64,
    /// Paired heart rate monitor; no heart rate feed is opened without one.
    pub heart_rate_device: Option<String>,
    /// Identifier of the ongoing-run notification.
    pub notification_id: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            dedupe_window_ms: 800,
            tick_interval_ms: 1_000,
            feed_timeout_ms: 10_000,
            notification_timeout_ms: 2_000,
            hr_scan_timeout_ms: 10_000,
            heart_rate_device: None,
            notification_id: "timer-active".to_string(),
        }
    }
}

impl RecorderConfig {
    /// Defaults overridden by `RUNS_HR_DEVICE`, `RUNS_FEED_TIMEOUT_MS` and
    /// `RUNS_DEDUPE_MS`. Unparseable numbers fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str| lookup(key).and_then(|raw| parse_u64(key, &raw));
        let defaults = Self::default();
        Self {
            heart_rate_device: lookup("RUNS_HR_DEVICE").filter(|s| !s.is_empty()),
            feed_timeout_ms: number("RUNS_FEED_TIMEOUT_MS").unwrap_or(defaults.feed_timeout_ms),
            dedupe_window_ms: number("RUNS_DEDUPE_MS").unwrap_or(defaults.dedupe_window_ms),
            ..defaults
        }
    }

    pub fn with_heart_rate_device(mut self, device_id: impl Into<String>) -> Self {
        self.heart_rate_device = Some(device_id.into());
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }

    pub fn hr_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.hr_scan_timeout_ms)
    }
}

fn parse_u64(key: &str, raw: &str) -> Option<u64> {
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring {key}={raw}: {e}");
            None
        }
    }
}
