//! Human-readable pace and duration strings.

/// Placeholder shown when a pace cannot be displayed.
pub const NO_PACE: &str = "\u{2014}";

/// Pace as `M:SS` per km, e.g. `5:30`.
pub fn format_pace(pace_min_per_km: f64) -> String {
    if !pace_min_per_km.is_finite() || pace_min_per_km <= 0.0 {
        return NO_PACE.to_string();
    }
    let mut minutes = pace_min_per_km.floor() as u64;
    let mut seconds = ((pace_min_per_km - minutes as f64) * 60.0).round() as u64;
    if seconds == 60 {
        minutes += 1;
        seconds = 0;
    }
    format!("{minutes}:{seconds:02}")
}

/// Duration as `M:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Stopwatch style `MM:SS`; minutes keep counting past 59.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
