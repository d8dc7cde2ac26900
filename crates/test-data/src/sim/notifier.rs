use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use runs::{
    errors::NotifyError,
    feeds::Subscription,
    notification::{ActionSink, NotificationChannel, NotificationResponse},
};

use super::lock;

/// What the recorder asked the notification channel to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Shown(String),
    Dismissed,
}

#[derive(Default)]
struct NotifierState {
    events: Vec<NotifierEvent>,
    listener: Option<(u64, ActionSink)>,
    next_id: u64,
    last_action: Option<NotificationResponse>,
    failing: bool,
}

/// Notification channel that records calls and lets the test tap buttons.
#[derive(Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response `last_action` returns, as if tapped while the app was closed.
    pub fn set_last_action(&self, response: NotificationResponse) {
        lock(&self.state).last_action = Some(response);
    }

    /// Makes show and dismiss fail.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Delivers a tap through the live listener and remembers it as the last action.
    pub fn tap(&self, action: &str, notification_id: &str) -> bool {
        let response = NotificationResponse::new(action, notification_id);
        let listener = {
            let mut state = lock(&self.state);
            state.last_action = Some(response.clone());
            state.listener.as_ref().map(|(_, sink)| sink.clone())
        };
        listener.is_some_and(|sink| sink.send(response))
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        lock(&self.state).events.clone()
    }

    /// Label currently on screen, if any.
    pub fn visible(&self) -> Option<String> {
        match lock(&self.state).events.last() {
            Some(NotifierEvent::Shown(label)) => Some(label.clone()),
            _ => None,
        }
    }

    /// Whether a recorder is still listening for taps.
    pub fn has_listener(&self) -> bool {
        lock(&self.state).listener.is_some()
    }

    fn record(&self, event: NotifierEvent) -> Result<(), NotifyError> {
        let mut state = lock(&self.state);
        if state.failing {
            return Err(NotifyError("notifications disabled".to_string()));
        }
        state.events.push(event);
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn show(&self, label: &str) -> Result<(), NotifyError> {
        self.record(NotifierEvent::Shown(label.to_string()))
    }

    async fn dismiss(&self) -> Result<(), NotifyError> {
        self.record(NotifierEvent::Dismissed)
    }

    fn on_action(&self, sink: ActionSink) -> Subscription {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.listener = Some((id, sink));

        let shared = self.state.clone();
        Subscription::new(move || {
            let mut state = lock(&shared);
            if state.listener.as_ref().is_some_and(|(active, _)| *active == id) {
                state.listener = None;
            }
        })
    }

    async fn last_action(&self) -> Option<NotificationResponse> {
        lock(&self.state).last_action.clone()
    }
}
