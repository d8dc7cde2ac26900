//! Ongoing-run notification contract and its action buttons.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, time::timeout};
use tracing::Instrument;

use crate::{
    clock::Clock, errors::NotifyError, feeds::Subscription, format::format_clock,
    recorder::Command,
};

pub const PLAY_PAUSE_ACTION: &str = "playPause";
pub const STOP_ACTION: &str = "stop";

/// Suffix appended to the label while the run is paused.
pub const PAUSED_SUFFIX: &str = " (paused)";

/// A tap on one of the notification's action buttons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub action_identifier: String,
    pub notification_id: String,
}

impl NotificationResponse {
    pub fn new(action_identifier: impl Into<String>, notification_id: impl Into<String>) -> Self {
        Self {
            action_identifier: action_identifier.into(),
            notification_id: notification_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    PlayPause,
    Stop,
}

impl NotificationAction {
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            PLAY_PAUSE_ACTION => Some(Self::PlayPause),
            STOP_ACTION => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn identifier(self) -> &'static str {
        match self {
            Self::PlayPause => PLAY_PAUSE_ACTION,
            Self::Stop => STOP_ACTION,
        }
    }
}

/// Label for the ongoing-run notification, e.g. `12:05` or `12:05 (paused)`.
pub fn timer_label(elapsed_seconds: u64, paused: bool) -> String {
    let clock = format_clock(elapsed_seconds);
    if paused {
        format!("{clock}{PAUSED_SUFFIX}")
    } else {
        clock
    }
}

/// Where the notification channel delivers action taps. Taps are timestamped on
/// receipt.
///
/// Holds the recorder weakly: a registered listener alone does not keep it running.
#[derive(Clone)]
pub struct ActionSink {
    tx: mpsc::WeakUnboundedSender<Command>,
    clock: Arc<dyn Clock>,
}

impl ActionSink {
    pub(crate) fn new(tx: mpsc::WeakUnboundedSender<Command>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, clock }
    }

    /// Returns false once the recorder has shut down.
    pub fn send(&self, response: NotificationResponse) -> bool {
        let received_ms = self.clock.now_ms();
        self.tx.upgrade().is_some_and(|tx| {
            tx.send(Command::Action {
                response,
                received_ms,
            })
            .is_ok()
        })
    }
}

enum Update {
    Show(String),
    Dismiss,
}

/// Applies show and dismiss requests in order on a background task.
///
/// Requests queued behind a slow call are collapsed to the latest one. The task ends
/// once the updater is dropped and its queue is drained.
pub(crate) struct NotificationUpdater {
    tx: mpsc::UnboundedSender<Update>,
}

impl NotificationUpdater {
    pub(crate) fn spawn(channel: Arc<dyn NotificationChannel>, limit: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(
            async move {
                while let Some(mut update) = rx.recv().await {
                    while let Ok(next) = rx.try_recv() {
                        update = next;
                    }
                    apply(channel.as_ref(), update, limit).await;
                }
            }
            .in_current_span(),
        );
        Self { tx }
    }

    pub(crate) fn show(&self, label: String) {
        let _ = self.tx.send(Update::Show(label));
    }

    pub(crate) fn dismiss(&self) {
        let _ = self.tx.send(Update::Dismiss);
    }
}

async fn apply(channel: &dyn NotificationChannel, update: Update, limit: Duration) {
    let (what, result) = match update {
        Update::Show(label) => ("show", timeout(limit, channel.show(&label)).await),
        Update::Dismiss => ("dismiss", timeout(limit, channel.dismiss()).await),
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Failed to {what} notification: {e}"),
        Err(_) => tracing::debug!("Notification {what} timed out"),
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Shows or replaces the ongoing-run notification.
    async fn show(&self, label: &str) -> Result<(), NotifyError>;

    async fn dismiss(&self) -> Result<(), NotifyError>;

    /// Registers a live listener for action taps.
    fn on_action(&self, sink: ActionSink) -> Subscription;

    /// The most recent tap, replayed once when the recorder starts.
    async fn last_action(&self) -> Option<NotificationResponse>;
}
