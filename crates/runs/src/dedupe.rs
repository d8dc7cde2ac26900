//! Collapses a notification action observed twice (live listener and last-response
//! replay) into a single delivery.

use crate::notification::NotificationResponse;

#[derive(Debug, Clone)]
struct Seen {
    notification_id: String,
    action_identifier: String,
    at_ms: i64,
}

/// Single-slot debounce keyed on `(notification id, action)`.
#[derive(Debug, Clone)]
pub struct ActionDeduper {
    window_ms: i64,
    last: Option<Seen>,
}

impl ActionDeduper {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            last: None,
        }
    }

    /// Returns true if the response should be acted on.
    ///
    /// A dropped duplicate does not extend the window.
    pub fn admit(&mut self, response: &NotificationResponse, now_ms: i64) -> bool {
        if let Some(last) = &self.last
            && last.notification_id == response.notification_id
            && last.action_identifier == response.action_identifier
            && now_ms - last.at_ms < self.window_ms
        {
            return false;
        }
        self.last = Some(Seen {
            notification_id: response.notification_id.clone(),
            action_identifier: response.action_identifier.clone(),
            at_ms: now_ms,
        });
        true
    }
}
