//! In-process stand-ins for the platform services a recorder talks to.
//!
//! Each fake records what the recorder did to it and lets a test drive it: emit a
//! fix, tap a notification button, fail the next save.

mod clock;
mod feeds;
mod notifier;
mod store;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use runs::recorder::Collaborators;

pub use clock::ManualClock;
pub use feeds::{SimulatedHeartRateFeed, SimulatedPositionFeed};
pub use notifier::{NotifierEvent, RecordingNotifier};
pub use store::MemoryRunStore;

/// One of each fake, sharing a clock, ready to hand to a recorder.
#[derive(Clone)]
pub struct SimWorld {
    pub clock: Arc<ManualClock>,
    pub positions: Arc<SimulatedPositionFeed>,
    pub heart_rate: Arc<SimulatedHeartRateFeed>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryRunStore>,
}

impl SimWorld {
    pub fn new(start_ms: i64) -> Self {
        Self {
            clock: Arc::new(ManualClock::new(start_ms)),
            positions: Arc::new(SimulatedPositionFeed::new()),
            heart_rate: Arc::new(SimulatedHeartRateFeed::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            store: Arc::new(MemoryRunStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            positions: self.positions.clone(),
            heart_rate: self.heart_rate.clone(),
            store: self.store.clone(),
            notifications: self.notifier.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Fakes never panic while holding a lock, but a test that does shouldn't wedge the rest.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
