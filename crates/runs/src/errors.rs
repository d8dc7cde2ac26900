use thiserror::Error;

use crate::models::RunStatus;

/// Failures opening or talking to a position or heart rate feed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Notification error: {0}")]
pub struct NotifyError(pub String);

/// Errors surfaced at recorder transition boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Position feed unavailable: {0}")]
    PositionFeed(#[from] FeedError),

    #[error("Cannot {op} while {status}")]
    InvalidTransition { op: &'static str, status: RunStatus },

    #[error("Cancelled by stop")]
    Cancelled,

    #[error("Recorder is shut down")]
    Closed,
}
