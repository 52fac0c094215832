//! Event type definitions for the processing pipeline.

use serde::Deserialize;

/// One externally-sourced observation of a player's cumulative counters.
///
/// Snapshots are already fetched by an upstream poller; the engine never
/// talks to the upstream API itself. `upstream_event_id` is set when the
/// snapshot originates from a discrete upstream event rather than a poll,
/// and enables idempotent replay through the `playerevents` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Snapshot {
    pub player_tag: String,
    pub player_name: String,
    pub clan_tag: String,
    pub donations: i64,
    pub received: i64,
    #[serde(default)]
    pub trophies: i64,
    #[serde(default)]
    pub upstream_event_id: Option<i64>,
}

/// One poll cycle's worth of snapshots.
///
/// The ingestor attributes the entire batch to the season that is active
/// when processing starts, so a mid-cycle rollover never splits one poll
/// cycle across two seasons.
#[derive(Debug, Clone)]
pub struct SnapshotBatch {
    pub snapshots: Vec<Snapshot>,
}

/// Emitted by the ingestor after a batch has been processed.
///
/// Triggers an immediate broadcast sweep instead of waiting for the next
/// periodic one. Carries counts only; the router re-reads the database.
#[derive(Debug, Clone, Copy)]
pub struct RecordedTick {
    /// Season the batch was attributed to.
    pub season_id: i64,
    /// Number of events recorded from the batch (0 if only baselines/resyncs).
    pub events_recorded: u32,
}
