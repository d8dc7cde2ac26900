//! Live run recorder.
//!
//! A single task owns the [`LiveRunState`]. Control calls from [`RecorderHandle`],
//! feed readings, notification taps and the elapsed-time ticker all arrive as
//! [`Command`]s on one queue and are applied one at a time, so no two transitions can
//! interleave.
//!
//! The task never waits on a collaborator. Feeds for a start or resume are opened on
//! a spawned task that reports back with [`Command::FeedsOpened`]; control commands
//! arriving meanwhile are held until it does, except `stop`, which cancels the open.
//! Notification updates go to a [`NotificationUpdater`].

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::{
    clock::Clock,
    config::RecorderConfig,
    dedupe::ActionDeduper,
    errors::{FeedError, RecorderError},
    feeds::{
        HeartRateDevice, HeartRateFeed, HeartRateSink, PositionFeed, PositionSink, Subscription,
        scan_devices,
    },
    live::{LiveMetrics, LiveRunState},
    models::{HeartRateSample, Position, Run, RunInsert, RunStatus},
    notification::{
        ActionSink, NotificationAction, NotificationChannel, NotificationResponse,
        NotificationUpdater,
    },
    store::RunStore,
};

/// Everything outside the engine that the recorder talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub positions: Arc<dyn PositionFeed>,
    pub heart_rate: Arc<dyn HeartRateFeed>,
    pub store: Arc<dyn RunStore>,
    pub notifications: Arc<dyn NotificationChannel>,
    pub clock: Arc<dyn Clock>,
}

type Reply = oneshot::Sender<Result<(), RecorderError>>;

pub(crate) enum Command {
    Start(Reply),
    Pause(oneshot::Sender<()>),
    Resume(Reply),
    PlayPause(Reply),
    Stop(oneshot::Sender<StopOutcome>),
    Tick,
    Snapshot(oneshot::Sender<LiveSnapshot>),
    Position { epoch: u64, position: Position },
    HeartRate { epoch: u64, sample: HeartRateSample },
    Action { response: NotificationResponse, received_ms: i64 },
    FeedsOpened { epoch: u64, result: Result<OpenedFeeds, FeedError> },
    Shutdown,
}

impl Command {
    /// Whether the command has to wait for an in-flight start or resume to settle.
    fn waits_for_open(&self) -> bool {
        !matches!(
            self,
            Command::Stop(_) | Command::Tick | Command::FeedsOpened { .. } | Command::Shutdown
        )
    }
}

/// Subscriptions opened for a start or resume. Dropping it cancels them.
pub(crate) struct OpenedFeeds {
    position: Subscription,
    heart_rate: Option<Subscription>,
    seed: Option<Position>,
}

enum Opening {
    Start { start_time_ms: i64, session: Uuid },
    Resume,
}

struct PendingOpen {
    opening: Opening,
    reply: Option<Reply>,
    task: JoinHandle<()>,
}

/// Copy of the live state plus the metrics derived from it.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    pub state: LiveRunState,
    pub metrics: LiveMetrics,
}

/// Result of a stop. The run (if any) is saved in the background.
#[derive(Debug, Default)]
pub struct StopOutcome {
    pub run: Option<RunInsert>,
    persistence: Option<JoinHandle<Option<Run>>>,
}

impl StopOutcome {
    /// Waits for the background save. `None` if nothing was saved or saving failed.
    pub async fn saved(self) -> Option<Run> {
        self.persistence?.await.ok().flatten()
    }
}

/// Cheap, cloneable control surface for a running [`Recorder`].
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<Command>,
    clock: Arc<dyn Clock>,
}

impl RecorderHandle {
    /// Resolves once the position feed is open. Fails with
    /// [`RecorderError::Cancelled`] if a stop arrives first.
    pub async fn start(&self) -> Result<(), RecorderError> {
        self.request(Command::Start).await?
    }

    /// No-op unless recording.
    pub async fn pause(&self) -> Result<(), RecorderError> {
        self.request(Command::Pause).await
    }

    /// No-op while already recording.
    pub async fn resume(&self) -> Result<(), RecorderError> {
        self.request(Command::Resume).await?
    }

    /// Starts, pauses or resumes depending on the current status.
    pub async fn play_pause(&self) -> Result<(), RecorderError> {
        self.request(Command::PlayPause).await?
    }

    /// Stops without waiting for a start or resume in flight, cancelling it.
    pub async fn stop(&self) -> Result<StopOutcome, RecorderError> {
        self.request(Command::Stop).await
    }

    /// Advances elapsed time by one second if recording.
    pub fn tick(&self) -> Result<(), RecorderError> {
        self.tx.send(Command::Tick).map_err(|_| RecorderError::Closed)
    }

    pub async fn snapshot(&self) -> Result<LiveSnapshot, RecorderError> {
        self.request(Command::Snapshot).await
    }

    /// Delivers a notification action as if it came from the channel's listener.
    pub fn notification_action(&self, response: NotificationResponse) -> Result<(), RecorderError> {
        let received_ms = self.clock.now_ms();
        self.tx
            .send(Command::Action {
                response,
                received_ms,
            })
            .map_err(|_| RecorderError::Closed)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RecorderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| RecorderError::Closed)?;
        reply_rx.await.map_err(|_| RecorderError::Closed)
    }
}

pub struct Recorder {
    config: RecorderConfig,
    collaborators: Collaborators,
    state: LiveRunState,
    dedupe: ActionDeduper,
    tx: mpsc::WeakUnboundedSender<Command>,
    /// Bumped whenever feeds are (re)opened or closed; stale readings are dropped.
    epoch: u64,
    session: Option<Uuid>,
    position_sub: Option<Subscription>,
    heart_rate_sub: Option<Subscription>,
    pending: Option<PendingOpen>,
    /// Commands held back while `pending` is set, in arrival order.
    deferred: VecDeque<Command>,
    notifications: NotificationUpdater,
    notification_shown: bool,
}

impl Recorder {
    /// Spawns the recorder task on the current tokio runtime.
    pub fn spawn(config: RecorderConfig, collaborators: Collaborators) -> (RecorderHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifications = NotificationUpdater::spawn(
            collaborators.notifications.clone(),
            config.notification_timeout(),
        );
        let action_sub = collaborators
            .notifications
            .on_action(ActionSink::new(tx.downgrade(), collaborators.clock.clone()));
        let handle = RecorderHandle {
            tx: tx.clone(),
            clock: collaborators.clock.clone(),
        };
        let recorder = Recorder {
            dedupe: ActionDeduper::new(config.dedupe_window_ms),
            config,
            collaborators,
            state: LiveRunState::default(),
            tx: tx.downgrade(),
            epoch: 0,
            session: None,
            position_sub: None,
            heart_rate_sub: None,
            pending: None,
            deferred: VecDeque::new(),
            notifications,
            notification_shown: false,
        };
        let task = tokio::spawn(recorder.run(rx, action_sub));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, action_sub: Subscription) {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let replay = self.collaborators.notifications.last_action();
        match timeout(self.config.notification_timeout(), replay).await {
            Ok(Some(response)) => {
                tracing::debug!(action = %response.action_identifier, "Replaying last notification action");
                let received_ms = self.collaborators.clock.now_ms();
                self.on_action(response, received_ms);
            }
            Ok(None) => {}
            Err(_) => tracing::warn!("Timed out reading the last notification action"),
        }
        // No immediate first tick, whether or not the replay started a run.
        ticker.reset();

        loop {
            let recording = self.state.status == RunStatus::Recording;
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    if matches!(command, Command::Shutdown) {
                        break;
                    }
                    self.span().in_scope(|| self.dispatch(command));
                    if !recording && self.state.status == RunStatus::Recording {
                        // Elapsed time restarts a full period after (re)entering Recording.
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if recording => {
                    self.span().in_scope(|| self.on_tick());
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
        self.close_feeds();
        action_sub.cancel();
        tracing::debug!("Recorder shut down");
    }

    fn span(&self) -> Span {
        match self.session {
            Some(session) => tracing::info_span!("run", session = %session),
            None => tracing::info_span!("recorder"),
        }
    }

    /// Applies `command` now or holds it behind an open in flight, then applies
    /// whatever the open was holding back once it settles.
    fn dispatch(&mut self, command: Command) {
        if self.pending.is_some() && command.waits_for_open() {
            self.deferred.push_back(command);
            return;
        }
        self.handle(command);
        while self.pending.is_none()
            && let Some(command) = self.deferred.pop_front()
        {
            self.handle(command);
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start(reply) => self.start(Some(reply)),
            Command::Pause(reply) => {
                self.pause();
                let _ = reply.send(());
            }
            Command::Resume(reply) => self.resume(Some(reply)),
            Command::PlayPause(reply) => self.play_pause(Some(reply)),
            Command::Stop(reply) => {
                let _ = reply.send(self.stop());
            }
            Command::Tick => self.on_tick(),
            Command::Snapshot(reply) => {
                let _ = reply.send(LiveSnapshot {
                    metrics: self.state.metrics(),
                    state: self.state.clone(),
                });
            }
            Command::Position { epoch, position } => {
                if epoch != self.epoch {
                    tracing::debug!("Dropping fix from a closed subscription");
                } else if !self.state.ingest_position(position) {
                    tracing::trace!("Fix not recorded");
                }
            }
            Command::HeartRate { epoch, sample } => {
                if epoch == self.epoch {
                    self.state.ingest_heart_rate(sample);
                }
            }
            Command::Action {
                response,
                received_ms,
            } => self.on_action(response, received_ms),
            Command::FeedsOpened { epoch, result } => self.on_feeds_opened(epoch, result),
            Command::Shutdown => {}
        }
    }

    fn start(&mut self, reply: Option<Reply>) {
        if self.state.status != RunStatus::Idle {
            respond(
                reply,
                Err(RecorderError::InvalidTransition {
                    op: "start",
                    status: self.state.status,
                }),
            );
            return;
        }
        let start_time_ms = self.collaborators.clock.now_ms();
        let session = Uuid::new_v4();
        self.open_feeds(
            Opening::Start {
                start_time_ms,
                session,
            },
            reply,
        );
    }

    fn pause(&mut self) {
        if !self.state.pause() {
            return;
        }
        self.close_feeds();
        tracing::info!(elapsed = self.state.elapsed_seconds, "Run paused");
        self.sync_notification();
    }

    fn resume(&mut self, reply: Option<Reply>) {
        match self.state.status {
            RunStatus::Recording => respond(reply, Ok(())),
            RunStatus::Paused => self.open_feeds(Opening::Resume, reply),
            status => respond(reply, Err(RecorderError::InvalidTransition { op: "resume", status })),
        }
    }

    fn play_pause(&mut self, reply: Option<Reply>) {
        match self.state.status {
            RunStatus::Idle => self.start(reply),
            RunStatus::Recording => {
                self.pause();
                respond(reply, Ok(()));
            }
            RunStatus::Paused => self.resume(reply),
            status => respond(
                reply,
                Err(RecorderError::InvalidTransition {
                    op: "play/pause",
                    status,
                }),
            ),
        }
    }

    fn stop(&mut self) -> StopOutcome {
        self.cancel_pending();
        self.close_feeds();
        if !matches!(self.state.status, RunStatus::Recording | RunStatus::Paused) {
            return StopOutcome::default();
        }

        let end_time_ms = self.collaborators.clock.now_ms();
        let run = self.state.finish(end_time_ms);
        let session = self.session.take();
        self.dismiss_notification();

        let Some(run) = run else {
            tracing::info!("Run stopped with no trace to save");
            return StopOutcome::default();
        };
        tracing::info!(
            distance_km = run.distance_km,
            duration_seconds = run.duration_seconds,
            points = run.path.len(),
            "Run stopped"
        );

        let store = self.collaborators.store.clone();
        let insert = run.clone();
        let span = match session {
            Some(session) => tracing::info_span!("save_run", %session),
            None => tracing::info_span!("save_run"),
        };
        let persistence = tokio::spawn(
            async move {
                match store.save(insert).await {
                    Ok(saved) => {
                        tracing::info!(id = saved.id, "Run saved");
                        Some(saved)
                    }
                    Err(e) => {
                        tracing::warn!("Failed to save run, discarding it: {e}");
                        None
                    }
                }
            }
            .instrument(span),
        );

        StopOutcome {
            run: Some(run),
            persistence: Some(persistence),
        }
    }

    /// Abandons an in-flight start or resume along with every control command held
    /// behind it. Snapshots are still answered.
    fn cancel_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        pending.task.abort();
        if let Some(reply) = pending.reply {
            let _ = reply.send(Err(RecorderError::Cancelled));
        }
        tracing::info!("Stop cancelled opening feeds");

        for command in std::mem::take(&mut self.deferred) {
            match command {
                Command::Start(reply) | Command::Resume(reply) | Command::PlayPause(reply) => {
                    let _ = reply.send(Err(RecorderError::Cancelled));
                }
                Command::Pause(reply) => {
                    let _ = reply.send(());
                }
                Command::Snapshot(reply) => self.deferred.push_back(Command::Snapshot(reply)),
                _ => {}
            }
        }
    }

    fn on_tick(&mut self) {
        if self.state.tick() {
            self.sync_notification();
        }
    }

    fn on_action(&mut self, response: NotificationResponse, received_ms: i64) {
        if response.notification_id != self.config.notification_id {
            tracing::debug!(notification = %response.notification_id, "Ignoring action for another notification");
            return;
        }
        if !self.dedupe.admit(&response, received_ms) {
            tracing::debug!(action = %response.action_identifier, "Duplicate notification action dropped");
            return;
        }
        match NotificationAction::from_identifier(&response.action_identifier) {
            Some(NotificationAction::PlayPause) => self.play_pause(None),
            Some(NotificationAction::Stop) => {
                // The background save reports its own outcome.
                let _ = self.stop();
            }
            None => {
                tracing::debug!(action = %response.action_identifier, "Ignoring unknown notification action");
            }
        }
    }

    fn open_feeds(&mut self, opening: Opening, reply: Option<Reply>) {
        let Some(tx) = self.tx.upgrade() else {
            respond(reply, Err(RecorderError::Closed));
            return;
        };
        self.epoch += 1;
        let epoch = self.epoch;
        let seed = matches!(opening, Opening::Start { .. });
        let collaborators = self.collaborators.clone();
        let config = self.config.clone();
        let span = match &opening {
            Opening::Start { session, .. } => tracing::info_span!("open_feeds", %session),
            Opening::Resume => tracing::info_span!("open_feeds"),
        };

        let task = tokio::spawn(
            async move {
                let result = open(&collaborators, &config, &tx, epoch, seed).await;
                // A closed queue drops `result`, cancelling what was opened.
                let _ = tx.send(Command::FeedsOpened { epoch, result });
            }
            .instrument(span),
        );
        self.pending = Some(PendingOpen {
            opening,
            reply,
            task,
        });
    }

    fn on_feeds_opened(&mut self, epoch: u64, result: Result<OpenedFeeds, FeedError>) {
        if epoch != self.epoch {
            tracing::debug!("Dropping feeds opened for a cancelled transition");
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        let opened = match result {
            Ok(opened) => opened,
            Err(e) => {
                match pending.opening {
                    Opening::Start { session, .. } => tracing::warn!(%session, "Not starting run: {e}"),
                    Opening::Resume => tracing::warn!("Not resuming run: {e}"),
                }
                respond(pending.reply, Err(e.into()));
                return;
            }
        };

        self.position_sub = Some(opened.position);
        self.heart_rate_sub = opened.heart_rate;
        match pending.opening {
            Opening::Start {
                start_time_ms,
                session,
            } => {
                self.state.begin(start_time_ms, opened.seed);
                self.session = Some(session);
                tracing::info!(
                    %session,
                    seeded = opened.seed.is_some(),
                    heart_rate = self.heart_rate_sub.is_some(),
                    "Run started"
                );
            }
            Opening::Resume => {
                self.state.resume();
                tracing::info!(elapsed = self.state.elapsed_seconds, "Run resumed");
            }
        }
        self.sync_notification();
        respond(pending.reply, Ok(()));
    }

    fn close_feeds(&mut self) {
        self.epoch += 1;
        if let Some(sub) = self.position_sub.take() {
            sub.cancel();
        }
        if let Some(sub) = self.heart_rate_sub.take() {
            sub.cancel();
        }
    }

    fn sync_notification(&mut self) {
        match self.state.notification_label() {
            Some(label) => {
                self.notifications.show(label);
                self.notification_shown = true;
            }
            None if self.notification_shown => self.dismiss_notification(),
            None => {}
        }
    }

    fn dismiss_notification(&mut self) {
        self.notification_shown = false;
        self.notifications.dismiss();
    }
}

fn respond(reply: Option<Reply>, result: Result<(), RecorderError>) {
    match reply {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => {
            if let Err(e) = result {
                tracing::warn!("Play/pause from notification failed: {e}");
            }
        }
    }
}

/// Opens the position feed, then the optional extras. Runs off the recorder task.
async fn open(
    collaborators: &Collaborators,
    config: &RecorderConfig,
    tx: &mpsc::UnboundedSender<Command>,
    epoch: u64,
    seed: bool,
) -> Result<OpenedFeeds, FeedError> {
    let limit = config.feed_timeout();
    let sink = PositionSink::new(tx.clone(), epoch);
    let position = bounded(limit, collaborators.positions.subscribe(sink)).await?;

    let seed = if seed {
        initial_fix(collaborators.positions.as_ref(), limit).await
    } else {
        None
    };
    let sink = HeartRateSink::new(tx.clone(), epoch, collaborators.clock.clone());
    let heart_rate = open_heart_rate_feed(config, collaborators.heart_rate.as_ref(), sink).await;

    Ok(OpenedFeeds {
        position,
        heart_rate,
        seed,
    })
}

/// Heart rate is optional: any failure just means the run has no samples.
async fn open_heart_rate_feed(
    config: &RecorderConfig,
    feed: &dyn HeartRateFeed,
    sink: HeartRateSink,
) -> Option<Subscription> {
    let device_id = config.heart_rate_device.as_deref()?;
    if !feed.is_available() {
        tracing::debug!("Heart rate feed not available");
        return None;
    }
    match bounded(config.feed_timeout(), feed.subscribe(device_id, sink)).await {
        Ok(sub) => Some(sub),
        Err(e) => {
            tracing::warn!(device = %device_id, "Heart rate monitor not connected: {e}");
            None
        }
    }
}

async fn initial_fix(feed: &dyn PositionFeed, limit: Duration) -> Option<Position> {
    match bounded(limit, feed.current_position()).await {
        Ok(fix) => fix,
        Err(e) => {
            tracing::warn!("No initial fix: {e}");
            None
        }
    }
}

/// Scans for heart rate monitors for the configured scan period.
pub async fn scan_heart_rate_monitors(
    config: &RecorderConfig,
    feed: &dyn HeartRateFeed,
) -> Result<Vec<HeartRateDevice>, FeedError> {
    let devices = scan_devices(feed, config.hr_scan_timeout()).await?;
    tracing::info!(found = devices.len(), "Heart rate scan finished");
    Ok(devices)
}

/// Runs a feed operation under the configured timeout.
async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T, FeedError>>,
) -> Result<T, FeedError> {
    timeout(limit, op)
        .await
        .map_err(|_| FeedError::Timeout(limit.as_millis() as u64))?
}
