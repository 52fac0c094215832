//! End-to-end engine tests against in-memory SQLite.

use async_trait::async_trait;
use donlog_core::db;
use donlog_core::delta::DecreasePolicy;
use donlog_core::entities::events::GetUnreportedEvents;
use donlog_core::entities::player_events::GetPlayerEvents;
use donlog_core::entities::players::GetPlayerState;
use donlog_core::entities::seasons::CreateSeason;
use donlog_core::entities::subscriptions::AddLiveSubscription;
use donlog_core::events::{recorded_tick_channel, snapshot_batch_channel, Snapshot, SnapshotBatch};
use donlog_core::framework::DatabaseProcessor;
use donlog_core::processors::{BroadcastConfig, BroadcastRouter, SnapshotIngestor};
use donlog_core::recorder::{EventRecorder, RecordOutcome};
use donlog_core::season::{SeasonClock, SeasonError};
use donlog_core::sink::{DeliveryError, NotificationSink};
use kanau::processor::Processor;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

async fn setup_pool() -> SqlitePool {
    // A single connection keeps every pool handle on the same in-memory
    // database.
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::init_schema(&pool).await.unwrap();
    pool
}

async fn create_season(pool: &SqlitePool, start: i64, finish: i64) -> i64 {
    DatabaseProcessor { pool: pool.clone() }
        .process(CreateSeason { start, finish })
        .await
        .unwrap()
}

fn snapshot(tag: &str, donations: i64, received: i64) -> Snapshot {
    Snapshot {
        player_tag: tag.to_string(),
        player_name: "Player".to_string(),
        clan_tag: "#CLAN".to_string(),
        donations,
        received,
        trophies: 2_500,
        upstream_event_id: None,
    }
}

/// Sink that remembers every delivered payload.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, channel_id: i64, payload: &str) -> Result<(), DeliveryError> {
        self.sent.lock().await.push((channel_id, payload.to_string()));
        Ok(())
    }
}

/// Sink that always fails with a retryable transport error.
struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn notify(&self, _channel_id: i64, _payload: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("connection refused".to_string()))
    }
}

/// Sink that permanently rejects every payload.
struct RejectingSink;

#[async_trait]
impl NotificationSink for RejectingSink {
    async fn notify(&self, _channel_id: i64, _payload: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected {
            status: 404,
            body: "unknown channel".to_string(),
        })
    }
}

fn test_broadcast_config() -> BroadcastConfig {
    BroadcastConfig {
        poll_limit: 100,
        max_attempts: 1,
        sweep_interval: std::time::Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn first_sighting_establishes_baseline_without_event() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    let outcome = recorder
        .record(&snapshot("#AAA", 10, 0), season_id, 100)
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Baseline);

    let db = DatabaseProcessor { pool: pool.clone() };
    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    assert!(events.is_empty());

    let state = db
        .process(GetPlayerState {
            player_tag: "#AAA".to_string(),
            season_id,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!((state.donations, state.received), (10, 0));
}

#[tokio::test]
async fn monotonic_snapshots_sum_to_final_minus_first() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    let observations = [10, 35, 60, 74];
    for (i, donations) in observations.iter().enumerate() {
        recorder
            .record(&snapshot("#AAA", *donations, 0), season_id, 100 + i as i64)
            .await
            .unwrap();
    }

    let db = DatabaseProcessor { pool: pool.clone() };
    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    let delta_sum: i64 = events.iter().map(|e| e.donations).sum();
    assert_eq!(delta_sum, 74 - 10);
    assert!(events.iter().all(|e| e.donations > 0 || e.received > 0));
}

#[tokio::test]
async fn decrease_resyncs_state_without_event() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    recorder.record(&snapshot("#AAA", 10, 0), season_id, 100).await.unwrap();
    let outcome = recorder.record(&snapshot("#AAA", 35, 0), season_id, 101).await.unwrap();
    assert!(matches!(outcome, RecordOutcome::Recorded { .. }));

    // Upstream correction: counter went down.
    let outcome = recorder.record(&snapshot("#AAA", 20, 0), season_id, 102).await.unwrap();
    assert_eq!(outcome, RecordOutcome::NoChange);

    let db = DatabaseProcessor { pool: pool.clone() };
    let state = db
        .process(GetPlayerState {
            player_tag: "#AAA".to_string(),
            season_id,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.donations, 20);

    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].donations, 25);

    // Deltas resume from the resynced value.
    let outcome = recorder.record(&snapshot("#AAA", 30, 0), season_id, 103).await.unwrap();
    match outcome {
        RecordOutcome::Recorded { delta, .. } => assert_eq!(delta.donations, 10),
        other => panic!("expected Recorded, got {other:?}"),
    }
}

#[tokio::test]
async fn restart_policy_takes_new_value_as_delta() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::RestartFromZero);

    recorder.record(&snapshot("#AAA", 35, 0), season_id, 100).await.unwrap();
    let outcome = recorder.record(&snapshot("#AAA", 20, 0), season_id, 101).await.unwrap();
    match outcome {
        RecordOutcome::Recorded { delta, .. } => assert_eq!(delta.donations, 20),
        other => panic!("expected Recorded, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_upstream_event_id_is_a_no_op() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    recorder.record(&snapshot("#QQQ", 10, 0), season_id, 100).await.unwrap();

    let mut first = snapshot("#QQQ", 35, 0);
    first.upstream_event_id = Some(42);
    let outcome = recorder.record(&first, season_id, 101).await.unwrap();
    assert!(matches!(outcome, RecordOutcome::Recorded { .. }));

    // Retried feed delivery with the same upstream id but drifted counters.
    let mut replay = snapshot("#QQQ", 50, 0);
    replay.upstream_event_id = Some(42);
    let outcome = recorder.record(&replay, season_id, 102).await.unwrap();
    assert_eq!(outcome, RecordOutcome::Duplicate);

    let db = DatabaseProcessor { pool: pool.clone() };
    let ledger = db
        .process(GetPlayerEvents {
            player_tag: "#QQQ".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].event_id, 42);

    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    assert_eq!(events.len(), 1);

    // The duplicate call was a full no-op, state included.
    let state = db
        .process(GetPlayerState {
            player_tag: "#QQQ".to_string(),
            season_id,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.donations, 35);
}

#[tokio::test]
async fn concurrent_records_for_same_upstream_id_record_once() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    recorder.record(&snapshot("#QQQ", 10, 0), season_id, 100).await.unwrap();

    let mut snap = snapshot("#QQQ", 40, 0);
    snap.upstream_event_id = Some(99);

    let r1 = recorder.clone();
    let s1 = snap.clone();
    let a = tokio::spawn(async move { r1.record(&s1, season_id, 101).await.unwrap() });
    let r2 = recorder.clone();
    let s2 = snap.clone();
    let b = tokio::spawn(async move { r2.record(&s2, season_id, 101).await.unwrap() });

    let outcomes = [a.await.unwrap(), b.await.unwrap()];
    let recorded = outcomes
        .iter()
        .filter(|o| matches!(o, RecordOutcome::Recorded { .. }))
        .count();
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, RecordOutcome::Duplicate))
        .count();
    assert_eq!((recorded, duplicates), (1, 1));

    let db = DatabaseProcessor { pool: pool.clone() };
    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn season_rollover_starts_fresh() {
    let pool = setup_pool().await;
    let season_a = create_season(&pool, 0, 100).await;
    let season_b = create_season(&pool, 100, 200).await;
    let clock = SeasonClock::new(pool.clone());
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    assert_eq!(clock.current_season(50).await.unwrap(), season_a);
    recorder.record(&snapshot("#AAA", 500, 0), season_a, 50).await.unwrap();

    // The boundary instant belongs to the new season.
    assert_eq!(clock.current_season(100).await.unwrap(), season_b);
    assert!(clock.has_rolled_over(season_a, 150).await.unwrap());

    // Season B has no prior state for the player, whatever season A held.
    let outcome = recorder.record(&snapshot("#AAA", 520, 0), season_b, 150).await.unwrap();
    assert_eq!(outcome, RecordOutcome::Baseline);
}

#[tokio::test]
async fn missing_season_aborts_the_batch() {
    let pool = setup_pool().await;
    create_season(&pool, 0, 100).await;
    let clock = SeasonClock::new(pool.clone());
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    let err = clock.current_season(500).await.unwrap_err();
    assert!(matches!(err, SeasonError::NoActiveSeason { now: 500 }));

    let (_batch_tx, batch_rx) = snapshot_batch_channel();
    let (tick_tx, _tick_rx) = recorded_tick_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestor = SnapshotIngestor::new(recorder, clock, batch_rx, tick_tx, shutdown_rx);

    let batch = SnapshotBatch {
        snapshots: vec![snapshot("#AAA", 10, 0)],
    };
    let result = ingestor.process_batch(batch, 500).await;
    assert!(matches!(result, Err(SeasonError::NoActiveSeason { .. })));
}

#[tokio::test]
async fn ingestor_counts_recorded_events_per_batch() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let clock = SeasonClock::new(pool.clone());
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    let (_batch_tx, batch_rx) = snapshot_batch_channel();
    let (tick_tx, _tick_rx) = recorded_tick_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestor = SnapshotIngestor::new(recorder, clock, batch_rx, tick_tx, shutdown_rx);

    // First batch only establishes baselines.
    let batch = SnapshotBatch {
        snapshots: vec![snapshot("#AAA", 10, 0), snapshot("#BBB", 0, 5)],
    };
    let tick = ingestor.process_batch(batch, 100).await.unwrap();
    assert_eq!(tick.season_id, season_id);
    assert_eq!(tick.events_recorded, 0);

    // Second batch: one change, one no-op.
    let batch = SnapshotBatch {
        snapshots: vec![snapshot("#AAA", 22, 0), snapshot("#BBB", 0, 5)],
    };
    let tick = ingestor.process_batch(batch, 160).await.unwrap();
    assert_eq!(tick.events_recorded, 1);
}

#[tokio::test]
async fn one_failing_player_does_not_abort_the_batch() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let clock = SeasonClock::new(pool.clone());
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    recorder.record(&snapshot("#AAA", 10, 0), season_id, 100).await.unwrap();
    recorder.record(&snapshot("#BBB", 10, 0), season_id, 100).await.unwrap();

    // Break the dedup ledger so any snapshot carrying an upstream event id
    // fails to record.
    sqlx::query("DROP TABLE playerevents").execute(&pool).await.unwrap();

    let (_batch_tx, batch_rx) = snapshot_batch_channel();
    let (tick_tx, _tick_rx) = recorded_tick_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestor = SnapshotIngestor::new(recorder, clock, batch_rx, tick_tx, shutdown_rx);

    let mut failing = snapshot("#AAA", 35, 0);
    failing.upstream_event_id = Some(7);
    let batch = SnapshotBatch {
        snapshots: vec![failing, snapshot("#BBB", 22, 0)],
    };
    let tick = ingestor.process_batch(batch, 160).await.unwrap();
    assert_eq!(tick.events_recorded, 1);

    // The healthy player's event and state both landed.
    let db = DatabaseProcessor { pool: pool.clone() };
    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].player_tag, "#BBB");
    assert_eq!(events[0].donations, 12);

    // The failing player's state is untouched; the next cycle retries it.
    let state = db
        .process(GetPlayerState {
            player_tag: "#AAA".to_string(),
            season_id,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.donations, 10);
}

#[tokio::test]
async fn broadcast_delivers_once_and_marks_reported() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);
    let db = DatabaseProcessor { pool: pool.clone() };

    db.process(AddLiveSubscription {
        channel_id: 111,
        fmt: "{player_name}: +{donations}".to_string(),
    })
    .await
    .unwrap();
    db.process(AddLiveSubscription {
        channel_id: 222,
        fmt: "{player_tag} {donations}/{received}".to_string(),
    })
    .await
    .unwrap();

    recorder.record(&snapshot("#AAA", 10, 0), season_id, 100).await.unwrap();
    recorder.record(&snapshot("#AAA", 35, 0), season_id, 101).await.unwrap();

    let sink = Arc::new(RecordingSink::default());
    let router = BroadcastRouter::new(pool.clone(), sink.clone(), test_broadcast_config());

    let stats = router.sweep().await.unwrap();
    assert_eq!(stats.events_polled, 1);
    assert_eq!(stats.events_reported, 1);
    assert_eq!(stats.deliveries, 2);

    {
        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&(111, "Player: +25".to_string())));
        assert!(sent.contains(&(222, "#AAA 25/0".to_string())));
    }

    // A reported event is never yielded again.
    let stats = router.sweep().await.unwrap();
    assert_eq!(stats.events_polled, 0);
    assert_eq!(sink.sent.lock().await.len(), 2);
}

#[tokio::test]
async fn failed_delivery_defers_to_the_next_sweep() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);
    let db = DatabaseProcessor { pool: pool.clone() };

    db.process(AddLiveSubscription {
        channel_id: 111,
        fmt: "{donations}".to_string(),
    })
    .await
    .unwrap();

    recorder.record(&snapshot("#AAA", 10, 0), season_id, 100).await.unwrap();
    recorder.record(&snapshot("#AAA", 35, 0), season_id, 101).await.unwrap();

    let failing = BroadcastRouter::new(pool.clone(), FailingSink, test_broadcast_config());
    let stats = failing.sweep().await.unwrap();
    assert_eq!(stats.events_reported, 0);
    assert_eq!(stats.failures, 1);

    // The sink recovers; the same event is re-yielded and drained.
    let sink = Arc::new(RecordingSink::default());
    let recovered = BroadcastRouter::new(pool.clone(), sink.clone(), test_broadcast_config());
    let stats = recovered.sweep().await.unwrap();
    assert_eq!(stats.events_polled, 1);
    assert_eq!(stats.events_reported, 1);
    assert_eq!(sink.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn rejected_channel_cannot_pin_an_event() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);
    let db = DatabaseProcessor { pool: pool.clone() };

    db.process(AddLiveSubscription {
        channel_id: 111,
        fmt: "{donations}".to_string(),
    })
    .await
    .unwrap();

    recorder.record(&snapshot("#AAA", 10, 0), season_id, 100).await.unwrap();
    recorder.record(&snapshot("#AAA", 35, 0), season_id, 101).await.unwrap();

    let router = BroadcastRouter::new(pool.clone(), RejectingSink, test_broadcast_config());
    let stats = router.sweep().await.unwrap();
    assert_eq!(stats.events_reported, 1);
    assert_eq!(stats.deliveries, 0);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn events_without_subscribers_are_retired() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 1_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    recorder.record(&snapshot("#AAA", 10, 0), season_id, 100).await.unwrap();
    recorder.record(&snapshot("#AAA", 35, 0), season_id, 101).await.unwrap();

    let sink = Arc::new(RecordingSink::default());
    let router = BroadcastRouter::new(pool.clone(), sink.clone(), test_broadcast_config());
    let stats = router.sweep().await.unwrap();
    assert_eq!(stats.events_reported, 1);
    assert!(sink.sent.lock().await.is_empty());
}

#[tokio::test]
async fn unreported_events_poll_oldest_first() {
    let pool = setup_pool().await;
    let season_id = create_season(&pool, 0, 10_000).await;
    let recorder = EventRecorder::new(pool.clone(), DecreasePolicy::ClampToZero);

    for (tag, times) in [("#AAA", [100, 300]), ("#BBB", [100, 200])] {
        recorder.record(&snapshot(tag, 10, 0), season_id, times[0]).await.unwrap();
        recorder.record(&snapshot(tag, 20, 0), season_id, times[1]).await.unwrap();
    }

    let db = DatabaseProcessor { pool: pool.clone() };
    let events = db.process(GetUnreportedEvents { limit: 10 }).await.unwrap();
    let times: Vec<i64> = events.iter().map(|e| e.time).collect();
    assert_eq!(times, vec![200, 300]);
    assert_eq!(events[0].player_tag, "#BBB");
}
