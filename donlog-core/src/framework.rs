//! Shared handle that database query processors run against.
//!
//! Queries are command objects processed via `kanau::processor::Processor`;
//! transactional statements bypass this and take the open transaction
//! directly.

use sqlx::SqlitePool;

pub struct DatabaseProcessor {
    pub pool: SqlitePool,
}
