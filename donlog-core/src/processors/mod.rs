pub mod broadcast;
pub mod ingest;

pub use broadcast::{BroadcastConfig, BroadcastRouter, SweepStats};
pub use ingest::SnapshotIngestor;
