//! Position and heart rate feed contracts.
//!
//! Feeds push readings into the recorder through sinks. Each sink is tagged with the
//! subscription it was handed out for, so readings from a cancelled subscription that
//! are still queued are dropped instead of leaking into a later session.

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    clock::Clock,
    errors::FeedError,
    models::{HeartRateSample, Position},
    recorder::Command,
};

/// Handle to an open feed subscription. Cancelled on [`cancel`](Self::cancel) or drop.
pub struct Subscription {
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_cancel.is_some())
            .finish()
    }
}

/// Where a position feed delivers fixes.
#[derive(Clone)]
pub struct PositionSink {
    tx: mpsc::UnboundedSender<Command>,
    epoch: u64,
}

impl PositionSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>, epoch: u64) -> Self {
        Self { tx, epoch }
    }

    /// Delivers a fix. Returns false once the recorder has shut down.
    pub fn send(&self, position: Position) -> bool {
        self.tx
            .send(Command::Position {
                epoch: self.epoch,
                position,
            })
            .is_ok()
    }
}

/// Where a heart rate feed delivers beats per minute. Readings are timestamped on
/// receipt.
#[derive(Clone)]
pub struct HeartRateSink {
    tx: mpsc::UnboundedSender<Command>,
    epoch: u64,
    clock: Arc<dyn Clock>,
}

impl HeartRateSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>, epoch: u64, clock: Arc<dyn Clock>) -> Self {
        Self { tx, epoch, clock }
    }

    pub fn send(&self, bpm: u16) -> bool {
        let sample = HeartRateSample::new(self.clock.now_ms(), bpm);
        self.tx
            .send(Command::HeartRate {
                epoch: self.epoch,
                sample,
            })
            .is_ok()
    }
}

#[async_trait]
pub trait PositionFeed: Send + Sync {
    /// One-off fix used to seed a new run's path, if the platform has one.
    async fn current_position(&self) -> Result<Option<Position>, FeedError>;

    /// Starts streaming fixes into `sink`. Fails when location access is unavailable.
    async fn subscribe(&self, sink: PositionSink) -> Result<Subscription, FeedError>;
}

/// A heart rate monitor found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateDevice {
    pub id: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait HeartRateFeed: Send + Sync {
    fn is_available(&self) -> bool;

    /// Reports devices through `on_device` until `timeout` elapses.
    async fn scan(
        &self,
        on_device: &(dyn Fn(HeartRateDevice) + Send + Sync),
        timeout: Duration,
    ) -> Result<(), FeedError>;

    async fn subscribe(
        &self,
        device_id: &str,
        sink: HeartRateSink,
    ) -> Result<Subscription, FeedError>;
}

/// Runs a scan and collects every distinct device it reported.
pub async fn scan_devices(
    feed: &dyn HeartRateFeed,
    timeout: Duration,
) -> Result<Vec<HeartRateDevice>, FeedError> {
    if !feed.is_available() {
        return Err(FeedError::Unavailable("heart rate feed".to_string()));
    }
    let found = Mutex::new(Vec::<HeartRateDevice>::new());
    let on_device = |device: HeartRateDevice| {
        if let Ok(mut found) = found.lock()
            && !found.iter().any(|d| d.id == device.id)
        {
            found.push(device);
        }
    };
    feed.scan(&on_device, timeout).await?;
    Ok(found.into_inner().unwrap_or_default())
}
