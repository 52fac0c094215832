//! Event system for the processing pipeline.
//!
//! # Event Flow
//!
//! 1. An external feed pushes a `SnapshotBatch` -> `SnapshotIngestor`
//! 2. `SnapshotIngestor` records events and emits `RecordedTick` -> `BroadcastRouter`
//! 3. `BroadcastRouter` delivers unreported events to subscriber channels
//!
//! Channel payloads are small and ephemeral; the durable truth lives in the
//! database, so a dropped tick at worst delays the next broadcast sweep.

pub mod channels;
pub mod types;

pub use channels::{
    recorded_tick_channel, snapshot_batch_channel, RecordedTickReceiver, RecordedTickSender,
    SnapshotBatchReceiver, SnapshotBatchSender, DEFAULT_CHANNEL_BUFFER,
};

pub use types::{RecordedTick, Snapshot, SnapshotBatch};
