use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use runs::{
    errors::FeedError,
    feeds::{HeartRateDevice, HeartRateFeed, HeartRateSink, PositionFeed, PositionSink, Subscription},
    models::Position,
};

use super::lock;

#[derive(Default)]
struct PositionFeedState {
    /// Active subscriber, tagged so a stale cancel can't clear a newer one.
    sink: Option<(u64, PositionSink)>,
    next_id: u64,
    current: Option<Position>,
    failure: Option<FeedError>,
    subscribe_delay: Option<Duration>,
    subscribe_calls: usize,
}

/// A GPS feed driven by the test.
#[derive(Default)]
pub struct SimulatedPositionFeed {
    state: Arc<Mutex<PositionFeedState>>,
}

impl SimulatedPositionFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix reported by `current_position`.
    pub fn set_current_position(&self, position: Option<Position>) {
        lock(&self.state).current = position;
    }

    /// Makes every subscribe fail with `error` until [`recover`](Self::recover).
    pub fn fail_with(&self, error: FeedError) {
        lock(&self.state).failure = Some(error);
    }

    pub fn recover(&self) {
        lock(&self.state).failure = None;
    }

    /// Makes subscribe take `delay` before answering.
    pub fn delay_subscribe(&self, delay: Duration) {
        lock(&self.state).subscribe_delay = Some(delay);
    }

    pub fn subscribe_calls(&self) -> usize {
        lock(&self.state).subscribe_calls
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// Delivers a fix to the current subscriber. False if there is none.
    pub fn emit(&self, latitude: f64, longitude: f64, timestamp_ms: i64) -> bool {
        self.emit_position(Position::new(latitude, longitude, timestamp_ms))
    }

    pub fn emit_position(&self, position: Position) -> bool {
        let sink = lock(&self.state).sink.as_ref().map(|(_, sink)| sink.clone());
        sink.is_some_and(|sink| sink.send(position))
    }

    /// Delivers a whole trace, returning how many fixes reached a subscriber.
    pub fn replay(&self, path: &[Position]) -> usize {
        path.iter().filter(|p| self.emit_position(**p)).count()
    }
}

#[async_trait]
impl PositionFeed for SimulatedPositionFeed {
    async fn current_position(&self) -> Result<Option<Position>, FeedError> {
        Ok(lock(&self.state).current)
    }

    async fn subscribe(&self, sink: PositionSink) -> Result<Subscription, FeedError> {
        let delay = {
            let mut state = lock(&self.state);
            state.subscribe_calls += 1;
            state.subscribe_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        state.next_id += 1;
        let id = state.next_id;
        state.sink = Some((id, sink));

        let shared = self.state.clone();
        Ok(Subscription::new(move || {
            let mut state = lock(&shared);
            if state.sink.as_ref().is_some_and(|(active, _)| *active == id) {
                state.sink = None;
            }
        }))
    }
}

struct HeartRateFeedState {
    available: bool,
    devices: Vec<HeartRateDevice>,
    sink: Option<(u64, HeartRateSink)>,
    connected_device: Option<String>,
    next_id: u64,
    failure: Option<FeedError>,
    subscribe_calls: usize,
}

/// A heart rate monitor feed driven by the test.
pub struct SimulatedHeartRateFeed {
    state: Arc<Mutex<HeartRateFeedState>>,
}

impl Default for SimulatedHeartRateFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHeartRateFeed {
    /// An available feed with no devices in range.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HeartRateFeedState {
                available: true,
                devices: Vec::new(),
                sink: None,
                connected_device: None,
                next_id: 0,
                failure: None,
                subscribe_calls: 0,
            })),
        }
    }

    /// A feed on a platform without heart rate support.
    pub fn unavailable() -> Self {
        let feed = Self::new();
        lock(&feed.state).available = false;
        feed
    }

    pub fn add_device(&self, id: &str, name: Option<&str>) {
        lock(&self.state).devices.push(HeartRateDevice {
            id: id.to_string(),
            name: name.map(str::to_string),
        });
    }

    pub fn fail_with(&self, error: FeedError) {
        lock(&self.state).failure = Some(error);
    }

    pub fn subscribe_calls(&self) -> usize {
        lock(&self.state).subscribe_calls
    }

    pub fn connected_device(&self) -> Option<String> {
        lock(&self.state).connected_device.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// Delivers a reading to the current subscriber. False if there is none.
    pub fn emit(&self, bpm: u16) -> bool {
        let sink = lock(&self.state).sink.as_ref().map(|(_, sink)| sink.clone());
        sink.is_some_and(|sink| sink.send(bpm))
    }
}

#[async_trait]
impl HeartRateFeed for SimulatedHeartRateFeed {
    fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    async fn scan(
        &self,
        on_device: &(dyn Fn(HeartRateDevice) + Send + Sync),
        timeout: Duration,
    ) -> Result<(), FeedError> {
        let devices = {
            let state = lock(&self.state);
            if !state.available {
                return Err(FeedError::Unavailable("bluetooth off".to_string()));
            }
            state.devices.clone()
        };
        for device in devices {
            on_device(device);
        }
        tokio::time::sleep(timeout).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        device_id: &str,
        sink: HeartRateSink,
    ) -> Result<Subscription, FeedError> {
        let mut state = lock(&self.state);
        state.subscribe_calls += 1;
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        if !state.devices.iter().any(|d| d.id == device_id) {
            return Err(FeedError::DeviceNotFound(device_id.to_string()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.sink = Some((id, sink));
        state.connected_device = Some(device_id.to_string());

        let shared = self.state.clone();
        Ok(Subscription::new(move || {
            let mut state = lock(&shared);
            if state.sink.as_ref().is_some_and(|(active, _)| *active == id) {
                state.sink = None;
                state.connected_device = None;
            }
        }))
    }
}
