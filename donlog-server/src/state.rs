//! Application state shared across all request handlers.

use donlog_core::events::SnapshotBatchSender;
use sqlx::SqlitePool;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: SqlitePool,
    /// Hands snapshot batches from the ingest endpoint to the ingestor.
    pub batch_tx: SnapshotBatchSender,
}

impl AppState {
    pub fn new(db: SqlitePool, batch_tx: SnapshotBatchSender) -> Self {
        Self { db, batch_tx }
    }
}
