//! Event recording: turns one snapshot into at most one durable event row.
//!
//! The whole per-player sequence (read stored state, compute the delta,
//! dedup-check the upstream event id, write the event, upsert the state)
//! runs in a single SQLite transaction. That gives the per-key
//! serialization the player store requires and makes an aborted cycle
//! harmless: re-running it from scratch never double-counts.

use crate::delta::{self, DecreasePolicy, Delta};
use crate::entities::events::{DonationEvent, DonationEventInsert};
use crate::entities::player_events::PlayerEventRow;
use crate::entities::players::PlayerState;
use crate::events::Snapshot;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while recording a snapshot.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What one `record` call did. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A non-zero delta was detected and an event row written.
    Recorded { event_id: i64, delta: Delta },
    /// First sighting this season; a baseline row was established.
    Baseline,
    /// Counters unchanged (or resynced downward); state updated, no event.
    NoChange,
    /// The (player_tag, upstream_event_id) key was already recorded.
    /// The whole call was a no-op.
    Duplicate,
}

/// Records snapshots against the player state store and the event tables.
#[derive(Clone)]
pub struct EventRecorder {
    pool: SqlitePool,
    policy: DecreasePolicy,
}

impl EventRecorder {
    pub fn new(pool: SqlitePool, policy: DecreasePolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> DecreasePolicy {
        self.policy
    }

    /// Record one snapshot for the given season.
    ///
    /// The dedup insert runs before the event insert, so a duplicate
    /// upstream event id rolls the transaction back before anything else is
    /// written. Outside the duplicate case the player state is always
    /// brought up to the snapshot's cumulative values, whether or not an
    /// event was produced.
    pub async fn record(
        &self,
        snapshot: &Snapshot,
        season_id: i64,
        now: i64,
    ) -> Result<RecordOutcome, RecordError> {
        let mut tx = self.pool.begin().await?;

        let prior = PlayerState::get_tx(&mut tx, &snapshot.player_tag, season_id).await?;
        let first_sighting = prior.is_none();
        let delta = delta::detect(
            prior.as_ref(),
            snapshot.donations,
            snapshot.received,
            self.policy,
        );

        if let Some(upstream_event_id) = snapshot.upstream_event_id {
            let inserted = PlayerEventRow::insert_dedup_tx(
                &mut tx,
                &snapshot.player_tag,
                snapshot.donations,
                snapshot.received,
                upstream_event_id,
                snapshot.trophies,
            )
            .await?;
            if !inserted {
                tx.rollback().await?;
                debug!(
                    player_tag = %snapshot.player_tag,
                    upstream_event_id,
                    "Duplicate upstream event id, skipping"
                );
                return Ok(RecordOutcome::Duplicate);
            }
        }

        let outcome = if first_sighting {
            RecordOutcome::Baseline
        } else if delta.is_zero() {
            RecordOutcome::NoChange
        } else {
            let event_id = DonationEvent::insert_tx(
                &mut tx,
                &DonationEventInsert {
                    player_tag: snapshot.player_tag.clone(),
                    player_name: snapshot.player_name.clone(),
                    clan_tag: snapshot.clan_tag.clone(),
                    donations: delta.donations,
                    received: delta.received,
                    time: now,
                    season_id,
                },
            )
            .await?;
            RecordOutcome::Recorded { event_id, delta }
        };

        PlayerState::upsert_tx(
            &mut tx,
            &snapshot.player_tag,
            season_id,
            snapshot.donations,
            snapshot.received,
            now,
        )
        .await?;

        tx.commit().await?;

        debug!(
            player_tag = %snapshot.player_tag,
            season_id,
            outcome = ?outcome,
            "Recorded snapshot"
        );

        Ok(outcome)
    }
}
