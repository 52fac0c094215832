//! Player state rows: the last observed cumulative counters per
//! (player_tag, season_id). This is the source of truth that deltas are
//! computed against. Counters never carry across seasons; a fresh season
//! means a fresh row.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PlayerState {
    pub player_tag: String,
    pub season_id: i64,
    pub donations: i64,
    pub received: i64,
    pub last_updated: i64,
}

#[derive(Debug, Clone)]
/// Fetch the stored state for one (player_tag, season_id) key.
///
/// `None` means first sighting this season; the caller establishes a
/// baseline rather than recording an event.
pub struct GetPlayerState {
    pub player_tag: String,
    pub season_id: i64,
}

impl Processor<GetPlayerState> for DatabaseProcessor {
    type Output = Option<PlayerState>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPlayerState")]
    async fn process(&self, query: GetPlayerState) -> Result<Option<PlayerState>, sqlx::Error> {
        let state = sqlx::query_as::<_, PlayerState>(
            r#"
            SELECT player_tag, season_id, donations, received, last_updated
            FROM players
            WHERE player_tag = ? AND season_id = ?
            "#,
        )
        .bind(&query.player_tag)
        .bind(query.season_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }
}

impl PlayerState {
    /// Fetch the stored state for a key inside an open transaction.
    pub async fn get_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        player_tag: &str,
        season_id: i64,
    ) -> Result<Option<PlayerState>, sqlx::Error> {
        sqlx::query_as::<_, PlayerState>(
            r#"
            SELECT player_tag, season_id, donations, received, last_updated
            FROM players
            WHERE player_tag = ? AND season_id = ?
            "#,
        )
        .bind(player_tag)
        .bind(season_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Overwrite the counters for a key, creating the row if absent.
    ///
    /// The (player_tag, season_id) primary key makes this a last-writer-wins
    /// upsert; running it inside the recording transaction serializes the
    /// read-then-write sequence for the key.
    pub async fn upsert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        player_tag: &str,
        season_id: i64,
        donations: i64,
        received: i64,
        now: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO players (player_tag, season_id, donations, received, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (player_tag, season_id)
            DO UPDATE SET donations = excluded.donations,
                          received = excluded.received,
                          last_updated = excluded.last_updated
            "#,
        )
        .bind(player_tag)
        .bind(season_id)
        .bind(donations)
        .bind(received)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
