//! End-to-end recorder behaviour against simulated feeds, notifications and stores.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use runs::{
    Recorder, RecorderHandle, SqliteRunStore,
    config::RecorderConfig,
    errors::{FeedError, NotifyError, RecorderError},
    feeds::Subscription,
    models::{Position, RunStatus},
    notification::{
        ActionSink, NotificationChannel, NotificationResponse, PLAY_PAUSE_ACTION, STOP_ACTION,
    },
    recorder::scan_heart_rate_monitors,
    splits::splits_from_path,
    store::RunStore,
};
use test_data::prelude::*;

/// Longitude degrees spanning one kilometre at the equator.
const KM: f64 = 1.0 / 111.194_926_644_558_73;
const NOTIFICATION: &str = "timer-active";

/// Ticks only when the test says so.
fn manual_ticks() -> RecorderConfig {
    RecorderConfig {
        tick_interval_ms: 3_600_000,
        ..RecorderConfig::default()
    }
}

fn spawn(world: &SimWorld, config: RecorderConfig) -> RecorderHandle {
    let (recorder, _task) = Recorder::spawn(config, world.collaborators());
    recorder
}

async fn status(recorder: &RecorderHandle) -> RunStatus {
    recorder.snapshot().await.unwrap().state.status
}

async fn eventually(mut done: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Waits for the notification updater to catch up.
async fn notification_reads(notifier: &RecordingNotifier, label: Option<&str>) {
    eventually(|| notifier.visible().as_deref() == label).await;
}

async fn last_event_is_dismiss(notifier: &RecordingNotifier) {
    eventually(|| notifier.events().last() == Some(&NotifierEvent::Dismissed)).await;
}

/// A notification channel that never answers.
struct StalledNotifier;

#[async_trait]
impl NotificationChannel for StalledNotifier {
    async fn show(&self, _label: &str) -> Result<(), NotifyError> {
        std::future::pending().await
    }

    async fn dismiss(&self) -> Result<(), NotifyError> {
        std::future::pending().await
    }

    fn on_action(&self, _sink: ActionSink) -> Subscription {
        Subscription::new(|| {})
    }

    async fn last_action(&self) -> Option<NotificationResponse> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_run_is_recorded_and_saved_once() {
    let world = SimWorld::new(1_000);
    world
        .positions
        .set_current_position(Some(Position::new(0.0, 0.0, 1_000)));
    let recorder = spawn(&world, manual_ticks());

    recorder.start().await.unwrap();
    assert!(world.positions.is_subscribed());
    assert!(world.positions.emit(0.0, 0.5 * KM, 150_000));
    assert!(world.positions.emit(0.0, 1.001 * KM, 301_000));
    for _ in 0..300 {
        recorder.tick().unwrap();
    }

    let snapshot = recorder.snapshot().await.unwrap();
    assert_eq!(snapshot.state.status, RunStatus::Recording);
    assert_eq!(snapshot.state.path.len(), 3);
    assert_eq!(snapshot.metrics.formatted_time, "05:00");
    assert!((snapshot.metrics.distance_km - 1.001).abs() < 1e-6);

    world.clock.set(302_000);
    let outcome = recorder.stop().await.unwrap();
    let run = outcome.saved().await.expect("run saved");

    assert_eq!(world.store.len(), 1);
    assert_eq!(run.start_time_ms, 1_000);
    assert_eq!(run.end_time_ms, 302_000);
    assert_eq!(run.duration_seconds, 300);
    assert!((run.pace_min_per_km - 5.0).abs() < 0.01);
    assert_eq!(splits_from_path(&run.path).len(), 1);

    assert_eq!(status(&recorder).await, RunStatus::Idle);
    assert!(!world.positions.is_subscribed());
    last_event_is_dismiss(&world.notifier).await;
}

#[tokio::test]
async fn test_start_aborts_when_location_is_denied() {
    let world = SimWorld::default();
    world.positions.fail_with(FeedError::PermissionDenied);
    let recorder = spawn(&world, manual_ticks());

    let err = recorder.start().await.unwrap_err();
    assert!(matches!(
        err,
        RecorderError::PositionFeed(FeedError::PermissionDenied)
    ));
    assert_eq!(status(&recorder).await, RunStatus::Idle);
    assert!(world.notifier.events().is_empty());

    world.positions.recover();
    recorder.start().await.unwrap();
    assert_eq!(status(&recorder).await, RunStatus::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_slow_location_subscribe_times_out() {
    let world = SimWorld::default();
    world.positions.delay_subscribe(Duration::from_secs(60));
    let config = RecorderConfig {
        feed_timeout_ms: 100,
        ..manual_ticks()
    };
    let recorder = spawn(&world, config);

    let err = recorder.start().await.unwrap_err();
    assert!(matches!(
        err,
        RecorderError::PositionFeed(FeedError::Timeout(100))
    ));
    assert_eq!(status(&recorder).await, RunStatus::Idle);
}

#[tokio::test]
async fn test_repeated_coordinates_are_not_appended() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();

    world.positions.emit(40.0, -105.0, 1_000);
    world.positions.emit(40.0, -105.0, 2_000);
    world.positions.emit(40.0001, -105.0, 3_000);
    world.positions.emit(40.0001, -105.0, 4_000);

    let path = recorder.snapshot().await.unwrap().state.path;
    let timestamps: Vec<i64> = path.iter().map(|p| p.timestamp_ms).collect();
    assert_eq!(timestamps, vec![1_000, 3_000]);
}

#[tokio::test]
async fn test_pause_and_resume_are_idempotent() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();

    recorder.resume().await.unwrap();
    assert_eq!(world.positions.subscribe_calls(), 1);

    recorder.pause().await.unwrap();
    recorder.pause().await.unwrap();
    assert_eq!(status(&recorder).await, RunStatus::Paused);
    assert!(!world.positions.is_subscribed());
    assert!(!world.positions.emit(1.0, 1.0, 5_000));

    recorder.resume().await.unwrap();
    recorder.resume().await.unwrap();
    assert_eq!(status(&recorder).await, RunStatus::Recording);
    assert_eq!(world.positions.subscribe_calls(), 2);
    assert!(world.positions.is_subscribed());
}

#[tokio::test]
async fn test_failed_resume_stays_paused() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    recorder.pause().await.unwrap();

    world
        .positions
        .fail_with(FeedError::Unavailable("location services off".to_string()));
    assert!(recorder.resume().await.is_err());
    assert_eq!(status(&recorder).await, RunStatus::Paused);
}

#[tokio::test]
async fn test_start_while_recording_is_rejected() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();

    let err = recorder.start().await.unwrap_err();
    assert!(matches!(
        err,
        RecorderError::InvalidTransition {
            status: RunStatus::Recording,
            ..
        }
    ));
    assert_eq!(world.positions.subscribe_calls(), 1);
}

#[tokio::test]
async fn test_stop_while_idle_does_nothing() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());

    let outcome = recorder.stop().await.unwrap();
    assert!(outcome.run.is_none());
    assert!(outcome.saved().await.is_none());
    assert!(world.store.is_empty());
}

#[tokio::test]
async fn test_stop_from_paused_saves_and_resets() {
    let world = SimWorld::new(1_000);
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    world.positions.emit(0.0, 0.0, 1_000);
    world.positions.emit(0.0, 0.2 * KM, 61_000);
    for _ in 0..60 {
        recorder.tick().unwrap();
    }
    recorder.pause().await.unwrap();
    world.clock.set(120_000);

    let run = recorder.stop().await.unwrap().saved().await.expect("run saved");
    assert_eq!(run.path.len(), 2);
    assert_eq!(run.duration_seconds, 60);
    assert_eq!(run.end_time_ms, 120_000);
    assert_eq!(world.store.len(), 1);

    let snapshot = recorder.snapshot().await.unwrap();
    assert_eq!(snapshot.state.status, RunStatus::Idle);
    assert!(snapshot.state.path.is_empty());
    last_event_is_dismiss(&world.notifier).await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_a_slow_resume() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    world.positions.emit(0.0, 0.0, 0);
    world.positions.emit(0.0, 0.1 * KM, 30_000);
    recorder.tick().unwrap();
    recorder.pause().await.unwrap();

    world.positions.delay_subscribe(Duration::from_secs(5));
    let resuming = tokio::spawn({
        let recorder = recorder.clone();
        async move { recorder.resume().await }
    });
    let positions = world.positions.clone();
    eventually(|| positions.subscribe_calls() == 2).await;

    let stopped_at = tokio::time::Instant::now();
    let outcome = recorder.stop().await.unwrap();
    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        resuming.await.unwrap(),
        Err(RecorderError::Cancelled)
    ));

    let run = outcome.saved().await.expect("run saved");
    assert_eq!(run.path.len(), 2);
    assert_eq!(run.duration_seconds, 1);
    assert_eq!(status(&recorder).await, RunStatus::Idle);

    // The abandoned subscribe never lands.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!world.positions.is_subscribed());
    assert!(!world.positions.emit(1.0, 1.0, 40_000));
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_a_slow_start() {
    let world = SimWorld::default();
    world.positions.delay_subscribe(Duration::from_secs(5));
    let recorder = spawn(&world, manual_ticks());

    let starting = tokio::spawn({
        let recorder = recorder.clone();
        async move { recorder.start().await }
    });
    let positions = world.positions.clone();
    eventually(|| positions.subscribe_calls() == 1).await;

    let outcome = recorder.stop().await.unwrap();
    assert!(outcome.run.is_none());
    assert!(matches!(
        starting.await.unwrap(),
        Err(RecorderError::Cancelled)
    ));
    assert_eq!(status(&recorder).await, RunStatus::Idle);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!world.positions.is_subscribed());
    assert!(world.notifier.events().is_empty());
}

#[tokio::test]
async fn test_stop_resets_even_when_save_fails() {
    let world = SimWorld::default();
    world.store.set_failing(true);
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    world.positions.emit(0.0, 0.0, 1_000);
    recorder.tick().unwrap();

    let outcome = recorder.stop().await.unwrap();
    assert!(outcome.run.is_some());
    assert!(outcome.saved().await.is_none());

    let snapshot = recorder.snapshot().await.unwrap();
    assert_eq!(snapshot.state.status, RunStatus::Idle);
    assert!(snapshot.state.path.is_empty());
    assert_eq!(snapshot.state.elapsed_seconds, 0);
    assert!(world.store.is_empty());
}

#[tokio::test]
async fn test_run_without_fixes_is_not_saved() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    recorder.tick().unwrap();

    let outcome = recorder.stop().await.unwrap();
    assert!(outcome.run.is_none());
    assert!(world.store.is_empty());
    assert_eq!(status(&recorder).await, RunStatus::Idle);
}

#[tokio::test]
async fn test_notification_follows_elapsed_time() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    assert_eq!(world.notifier.visible(), None);

    recorder.tick().unwrap();
    recorder.snapshot().await.unwrap();
    notification_reads(&world.notifier, Some("00:01")).await;

    recorder.pause().await.unwrap();
    notification_reads(&world.notifier, Some("00:01 (paused)")).await;

    recorder.resume().await.unwrap();
    notification_reads(&world.notifier, Some("00:01")).await;

    recorder.stop().await.unwrap();
    notification_reads(&world.notifier, None).await;
    last_event_is_dismiss(&world.notifier).await;
}

#[tokio::test]
async fn test_notification_failures_do_not_interrupt_the_run() {
    let world = SimWorld::default();
    world.notifier.set_failing(true);
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    recorder.tick().unwrap();
    recorder.tick().unwrap();

    let snapshot = recorder.snapshot().await.unwrap();
    assert_eq!(snapshot.state.elapsed_seconds, 2);
    assert!(world.notifier.events().is_empty());
}

#[tokio::test]
async fn test_notification_taps_are_debounced() {
    let world = SimWorld::new(10_000);
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();

    assert!(world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION));
    assert_eq!(status(&recorder).await, RunStatus::Paused);

    world.clock.advance(100);
    world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION);
    assert_eq!(status(&recorder).await, RunStatus::Paused);

    world.clock.advance(1_000);
    world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION);
    assert_eq!(status(&recorder).await, RunStatus::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_taps_while_starting_apply_in_order() {
    let world = SimWorld::default();
    world.positions.delay_subscribe(Duration::from_secs(2));
    let recorder = spawn(&world, manual_ticks());

    let starting = tokio::spawn({
        let recorder = recorder.clone();
        async move { recorder.start().await }
    });
    let positions = world.positions.clone();
    eventually(|| positions.subscribe_calls() == 1).await;

    // Both taps land while the position feed is still opening, a second apart.
    assert!(world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION));
    world.clock.advance(1_000);
    assert!(world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION));

    starting.await.unwrap().unwrap();
    // Started, paused by the first tap, resumed by the second.
    assert_eq!(status(&recorder).await, RunStatus::Recording);
    assert_eq!(world.positions.subscribe_calls(), 2);
}

#[tokio::test]
async fn test_replayed_action_and_live_tap_count_once() {
    let world = SimWorld::new(5_000);
    world
        .notifier
        .set_last_action(NotificationResponse::new(PLAY_PAUSE_ACTION, NOTIFICATION));
    let recorder = spawn(&world, manual_ticks());

    // The replay at launch starts a run.
    assert_eq!(status(&recorder).await, RunStatus::Recording);

    // The same tap arriving live moments later is dropped.
    world.clock.advance(50);
    world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION);
    assert_eq!(status(&recorder).await, RunStatus::Recording);
}

#[tokio::test]
async fn test_stop_action_saves_the_run() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();
    world.positions.emit(0.0, 0.0, 0);
    world.positions.emit(0.0, 0.1 * KM, 30_000);

    world.notifier.tap(STOP_ACTION, NOTIFICATION);
    assert_eq!(status(&recorder).await, RunStatus::Idle);
    let store = world.store.clone();
    eventually(|| store.len() == 1).await;
}

#[tokio::test]
async fn test_unknown_and_foreign_actions_are_ignored() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks());
    recorder.start().await.unwrap();

    world.notifier.tap("snooze", NOTIFICATION);
    world.clock.advance(1_000);
    world.notifier.tap(STOP_ACTION, "workout-reminder");
    assert_eq!(status(&recorder).await, RunStatus::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_notifications_do_not_stall_the_recorder() {
    let world = SimWorld::default();
    let mut collaborators = world.collaborators();
    collaborators.notifications = Arc::new(StalledNotifier);
    let (recorder, _task) = Recorder::spawn(manual_ticks(), collaborators);

    let started = tokio::time::Instant::now();
    recorder.start().await.unwrap();
    assert!(started.elapsed() <= RecorderConfig::default().notification_timeout());

    world.positions.emit(0.0, 0.0, 0);
    for _ in 0..3 {
        recorder.tick().unwrap();
    }
    assert_eq!(recorder.snapshot().await.unwrap().state.elapsed_seconds, 3);

    let run = recorder.stop().await.unwrap().saved().await.expect("run saved");
    assert_eq!(run.duration_seconds, 3);
}

#[tokio::test]
async fn test_listener_released_on_shutdown() {
    let world = SimWorld::default();
    let (recorder, task) = Recorder::spawn(manual_ticks(), world.collaborators());
    assert!(world.notifier.has_listener());
    recorder.start().await.unwrap();

    recorder.shutdown();
    task.await.unwrap();
    assert!(!world.notifier.has_listener());
    assert!(!world.positions.is_subscribed());
    assert!(!world.notifier.tap(PLAY_PAUSE_ACTION, NOTIFICATION));
    assert!(matches!(
        recorder.snapshot().await,
        Err(RecorderError::Closed)
    ));
}

#[tokio::test]
async fn test_heart_rate_from_paired_device() {
    let world = SimWorld::new(1_000);
    world.heart_rate.add_device("hrm-1", Some("Chest strap"));
    let config = manual_ticks().with_heart_rate_device("hrm-1");
    let recorder = spawn(&world, config);
    recorder.start().await.unwrap();
    assert_eq!(world.heart_rate.connected_device().as_deref(), Some("hrm-1"));

    world.positions.emit(0.0, 0.0, 1_000);
    world.clock.set(2_000);
    world.heart_rate.emit(140);
    world.clock.set(3_000);
    world.heart_rate.emit(161);

    let snapshot = recorder.snapshot().await.unwrap();
    assert_eq!(snapshot.metrics.current_bpm, Some(161));
    let stamps: Vec<i64> = snapshot
        .state
        .heart_rate_samples
        .iter()
        .map(|s| s.timestamp_ms)
        .collect();
    assert_eq!(stamps, vec![2_000, 3_000]);

    recorder.pause().await.unwrap();
    assert!(!world.heart_rate.is_subscribed());
    recorder.resume().await.unwrap();
    assert!(world.heart_rate.is_subscribed());

    let run = recorder.stop().await.unwrap().saved().await.unwrap();
    assert_eq!(run.avg_heart_rate, Some(151.0));
}

#[tokio::test]
async fn test_unavailable_heart_rate_feed_is_not_fatal() {
    let mut world = SimWorld::default();
    world.heart_rate = Arc::new(SimulatedHeartRateFeed::unavailable());
    world.heart_rate.add_device("hrm-1", None);
    let recorder = spawn(&world, manual_ticks().with_heart_rate_device("hrm-1"));

    recorder.start().await.unwrap();
    assert_eq!(status(&recorder).await, RunStatus::Recording);
    assert_eq!(world.heart_rate.subscribe_calls(), 0);
    assert!(!world.heart_rate.emit(150));
}

#[tokio::test]
async fn test_missing_heart_rate_monitor_is_not_fatal() {
    let world = SimWorld::default();
    let recorder = spawn(&world, manual_ticks().with_heart_rate_device("hrm-gone"));

    recorder.start().await.unwrap();
    assert_eq!(status(&recorder).await, RunStatus::Recording);
    assert!(!world.heart_rate.is_subscribed());
    assert_eq!(world.heart_rate.subscribe_calls(), 1);
}

#[tokio::test]
async fn test_no_heart_rate_without_paired_device() {
    let world = SimWorld::default();
    world.heart_rate.add_device("hrm-1", None);
    let recorder = spawn(&world, manual_ticks());

    recorder.start().await.unwrap();
    assert_eq!(world.heart_rate.subscribe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_counts_only_while_recording() {
    let world = SimWorld::default();
    let recorder = spawn(&world, RecorderConfig::default());

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(recorder.snapshot().await.unwrap().state.elapsed_seconds, 0);

    recorder.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(recorder.snapshot().await.unwrap().state.elapsed_seconds, 3);

    recorder.pause().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.snapshot().await.unwrap().state.elapsed_seconds, 3);

    recorder.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(recorder.snapshot().await.unwrap().state.elapsed_seconds, 4);
}

#[tokio::test]
async fn test_generated_trace_round_trips_through_sqlite() {
    let world = SimWorld::default();
    let sqlite = Arc::new(SqliteRunStore::in_memory().await.unwrap());
    let mut collaborators = world.collaborators();
    collaborators.store = sqlite.clone();
    let (recorder, _task) = Recorder::spawn(manual_ticks(), collaborators);

    let mut rng = StdRng::seed_from_u64(2024);
    let generated = ProceduralTrace::new()
        .with_distance(2.5)
        .with_duplicates(0.1)
        .with_gps_jitter(0.0)
        .without_heart_rate()
        .generate(&RunnerProfile::default(), &mut rng);
    let expected = generated.to_run_insert();

    recorder.start().await.unwrap();
    assert_eq!(world.positions.replay(&generated.path), generated.path.len());
    for _ in 0..expected.duration_seconds {
        recorder.tick().unwrap();
    }

    let saved = recorder.stop().await.unwrap().saved().await.unwrap();
    assert_eq!(saved.path, expected.path);
    assert_eq!(saved.duration_seconds, expected.duration_seconds);
    assert!((saved.distance_km - expected.distance_km).abs() < 1e-9);
    assert_eq!(splits_from_path(&saved.path).len(), 2);

    let listed = sqlite.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, saved.id);
}

#[tokio::test(start_paused = true)]
async fn test_heart_rate_scan_uses_configured_period() {
    let world = SimWorld::default();
    world.heart_rate.add_device("hrm-1", Some("Chest strap"));
    let config = RecorderConfig {
        hr_scan_timeout_ms: 4_000,
        ..RecorderConfig::default()
    };

    let started = tokio::time::Instant::now();
    let devices = scan_heart_rate_monitors(&config, world.heart_rate.as_ref())
        .await
        .unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "hrm-1");
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}
