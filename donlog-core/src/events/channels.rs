//! Event channel factories and handles.

use super::types::{RecordedTick, SnapshotBatch};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// Enough to absorb bursts from the feed while keeping memory bounded;
/// a full channel pushes backpressure onto the feed adapter.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for SnapshotBatch payloads.
pub type SnapshotBatchSender = mpsc::Sender<SnapshotBatch>;
/// Receiver handle for SnapshotBatch payloads.
pub type SnapshotBatchReceiver = mpsc::Receiver<SnapshotBatch>;

/// Sender handle for RecordedTick events.
pub type RecordedTickSender = mpsc::Sender<RecordedTick>;
/// Receiver handle for RecordedTick events.
pub type RecordedTickReceiver = mpsc::Receiver<RecordedTick>;

/// Create a new SnapshotBatch channel.
///
/// Multiple senders can be cloned from the returned sender; the single
/// receiver belongs to the `SnapshotIngestor`.
pub fn snapshot_batch_channel() -> (SnapshotBatchSender, SnapshotBatchReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new RecordedTick channel.
pub fn recorded_tick_channel() -> (RecordedTickSender, RecordedTickReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
