//! The per-player idempotency ledger. Rows are keyed by
//! (player_tag, event_id) where `event_id` is the upstream-supplied
//! identifier of a discrete feed event; the primary key guarantees
//! at-most-once recording even under retried or concurrent ingestion.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PlayerEventRow {
    pub player_tag: String,
    pub donations: i64,
    pub received: i64,
    pub event_id: i64,
    pub live: bool,
    pub trophies: i64,
}

impl PlayerEventRow {
    /// Attempt the dedup insert inside an open transaction.
    ///
    /// Uses ON CONFLICT DO NOTHING; returns false when the
    /// (player_tag, event_id) key was already recorded.
    pub async fn insert_dedup_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        player_tag: &str,
        donations: i64,
        received: i64,
        event_id: i64,
        trophies: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO playerevents (player_tag, donations, received, event_id, live, trophies)
            VALUES (?, ?, ?, ?, TRUE, ?)
            ON CONFLICT (player_tag, event_id) DO NOTHING
            "#,
        )
        .bind(player_tag)
        .bind(donations)
        .bind(received)
        .bind(event_id)
        .bind(trophies)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// Fetch the ledger rows for one player, ordered by upstream event id.
pub struct GetPlayerEvents {
    pub player_tag: String,
}

impl Processor<GetPlayerEvents> for DatabaseProcessor {
    type Output = Vec<PlayerEventRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPlayerEvents")]
    async fn process(&self, query: GetPlayerEvents) -> Result<Vec<PlayerEventRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PlayerEventRow>(
            r#"
            SELECT player_tag, donations, received, event_id, live, trophies
            FROM playerevents
            WHERE player_tag = ?
            ORDER BY event_id ASC
            "#,
        )
        .bind(&query.player_tag)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
