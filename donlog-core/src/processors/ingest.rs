//! SnapshotIngestor processor.
//!
//! The SnapshotIngestor is responsible for:
//! - Receiving `SnapshotBatch` payloads from the feed adapter
//! - Resolving the active season once per batch
//! - Running the delta/record sequence for every snapshot in the batch
//! - Emitting a `RecordedTick` so the broadcast router sweeps promptly
//!
//! One player's failure never aborts the rest of the batch; a missing
//! season aborts the whole batch, which is retried by the next poll cycle.

use crate::events::{RecordedTick, RecordedTickSender, Snapshot, SnapshotBatch, SnapshotBatchReceiver};
use crate::recorder::{EventRecorder, RecordError, RecordOutcome};
use crate::season::{SeasonClock, SeasonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Attempts per snapshot before its failure is counted and the batch moves
/// on. Retries cover transient storage errors only; the batch as a whole is
/// never re-run, so already-committed players are not reprocessed.
const RECORD_ATTEMPTS: u32 = 3;

/// SnapshotIngestor drives snapshots through delta detection and recording.
pub struct SnapshotIngestor {
    recorder: EventRecorder,
    clock: SeasonClock,
    batch_rx: SnapshotBatchReceiver,
    tick_tx: RecordedTickSender,
    shutdown_rx: watch::Receiver<bool>,
}

impl SnapshotIngestor {
    pub fn new(
        recorder: EventRecorder,
        clock: SeasonClock,
        batch_rx: SnapshotBatchReceiver,
        tick_tx: RecordedTickSender,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            recorder,
            clock,
            batch_rx,
            tick_tx,
            shutdown_rx,
        }
    }

    /// Run the SnapshotIngestor until shutdown is signaled.
    pub async fn run(mut self) {
        info!("SnapshotIngestor started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("SnapshotIngestor received shutdown signal");
                        break;
                    }
                }

                Some(batch) = self.batch_rx.recv() => {
                    let now = time::OffsetDateTime::now_utc().unix_timestamp();
                    match self.process_batch(batch, now).await {
                        Ok(tick) => {
                            if let Err(e) = self.tick_tx.send(tick).await {
                                error!(error = %e, "Failed to send RecordedTick");
                            }
                        }
                        Err(e) => {
                            // The batch is dropped; the upstream poller's
                            // next cycle re-presents current counters.
                            error!(error = %e, "Batch aborted");
                        }
                    }
                }

                else => {
                    info!("SnapshotBatch channel closed");
                    break;
                }
            }
        }

        info!("SnapshotIngestor shutdown complete");
    }

    /// Process one batch, attributing every snapshot to the season that is
    /// active at `now`.
    pub async fn process_batch(
        &self,
        batch: SnapshotBatch,
        now: i64,
    ) -> Result<RecordedTick, SeasonError> {
        let season_id = self.clock.current_season(now).await?;
        let total = batch.snapshots.len();
        let mut events_recorded = 0u32;
        let mut duplicates = 0u32;
        let mut failures = 0u32;

        for snapshot in &batch.snapshots {
            match self.record_with_retry(snapshot, season_id, now).await {
                Ok(RecordOutcome::Recorded { event_id, delta }) => {
                    events_recorded += 1;
                    debug!(
                        player_tag = %snapshot.player_tag,
                        event_id,
                        donations = delta.donations,
                        received = delta.received,
                        "Event recorded"
                    );
                }
                Ok(RecordOutcome::Duplicate) => duplicates += 1,
                Ok(RecordOutcome::Baseline | RecordOutcome::NoChange) => {}
                Err(e) => {
                    failures += 1;
                    warn!(
                        player_tag = %snapshot.player_tag,
                        error = %e,
                        "Failed to record snapshot"
                    );
                }
            }
        }

        info!(
            season_id,
            total, events_recorded, duplicates, failures, "Batch processed"
        );

        Ok(RecordedTick {
            season_id,
            events_recorded,
        })
    }

    /// Record one snapshot, retrying transient storage errors with
    /// exponential backoff.
    async fn record_with_retry(
        &self,
        snapshot: &Snapshot,
        season_id: i64,
        now: i64,
    ) -> Result<RecordOutcome, RecordError> {
        let mut attempt = 0u32;
        loop {
            match self.recorder.record(snapshot, season_id, now).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    attempt += 1;
                    if attempt >= RECORD_ATTEMPTS {
                        return Err(e);
                    }
                    warn!(
                        player_tag = %snapshot.player_tag,
                        attempt,
                        error = %e,
                        "Record attempt failed, retrying"
                    );
                    let delay = std::time::Duration::from_millis(100 * 2u64.pow(attempt));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
