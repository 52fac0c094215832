//! Season clock: resolves which season a point in time belongs to.
//!
//! Seasons are half-open `[start, finish)` intervals of unix seconds, so the
//! exact rollover instant belongs to the new season and is never counted
//! twice. The clock is read-only; season rows are created administratively.

use crate::entities::seasons::{GetActiveSeason, Season};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::SqlitePool;
use thiserror::Error;

/// Errors from season resolution.
#[derive(Debug, Error)]
pub enum SeasonError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No season interval contains the given instant. Fatal for the current
    /// cycle: no events can be attributed until a season row exists.
    #[error("no active season contains timestamp {now}")]
    NoActiveSeason { now: i64 },
}

/// Read-only view over the `seasons` table.
#[derive(Clone)]
pub struct SeasonClock {
    pool: SqlitePool,
}

impl SeasonClock {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The id of the season whose interval contains `now`.
    pub async fn current_season(&self, now: i64) -> Result<i64, SeasonError> {
        let season = self.active_season(now).await?;
        Ok(season.id)
    }

    /// The full season row whose interval contains `now`.
    pub async fn active_season(&self, now: i64) -> Result<Season, SeasonError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        db.process(GetActiveSeason { now })
            .await?
            .ok_or(SeasonError::NoActiveSeason { now })
    }

    /// Whether the active season at `now` differs from `previous_season_id`.
    pub async fn has_rolled_over(
        &self,
        previous_season_id: i64,
        now: i64,
    ) -> Result<bool, SeasonError> {
        let current = self.current_season(now).await?;
        Ok(current != previous_season_id)
    }
}
