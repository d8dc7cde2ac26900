//! Run tracking engine: live recording of GPS runs, per-kilometre analytics and
//! persistence of finished runs.

pub mod clock;
pub mod config;
pub mod dedupe;
pub mod detail;
pub mod errors;
pub mod feeds;
pub mod format;
pub mod geodesy;
pub mod heart_rate;
pub mod interpolation;
pub mod live;
pub mod models;
pub mod notification;
pub mod recorder;
pub mod splits;
pub mod store;

pub use recorder::{Collaborators, LiveSnapshot, Recorder, RecorderHandle, StopOutcome};
pub use store::{RunStore, SqliteRunStore};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
