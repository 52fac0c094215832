//! Donation event rows: one detected change per row. The `donations` and
//! `received` columns are deltas, not cumulative counters, and at least one
//! of them is non-zero. `reported` transitions false -> true exactly once,
//! by the broadcast router.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DonationEvent {
    pub id: i64,
    pub player_tag: String,
    pub player_name: String,
    pub clan_tag: String,
    pub donations: i64,
    pub received: i64,
    pub time: i64,
    pub reported: bool,
    pub season_id: i64,
}

/// Column values for inserting a new event.
#[derive(Debug, Clone)]
pub struct DonationEventInsert {
    pub player_tag: String,
    pub player_name: String,
    pub clan_tag: String,
    pub donations: i64,
    pub received: i64,
    pub time: i64,
    pub season_id: i64,
}

impl DonationEvent {
    /// Insert an event row inside an open transaction. Returns the new id.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        insert: &DonationEventInsert,
    ) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events (player_tag, player_name, clan_tag, donations, received, time, reported, season_id)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)
            RETURNING id
            "#,
        )
        .bind(&insert.player_tag)
        .bind(&insert.player_name)
        .bind(&insert.clan_tag)
        .bind(insert.donations)
        .bind(insert.received)
        .bind(insert.time)
        .bind(insert.season_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy)]
/// Fetch unreported events ordered by time ascending.
///
/// Restartable: until an event is marked reported, every call yields it
/// again, so a partially failed delivery pass is retried by the next one.
pub struct GetUnreportedEvents {
    pub limit: i64,
}

impl Processor<GetUnreportedEvents> for DatabaseProcessor {
    type Output = Vec<DonationEvent>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUnreportedEvents")]
    async fn process(&self, query: GetUnreportedEvents) -> Result<Vec<DonationEvent>, sqlx::Error> {
        let events = sqlx::query_as::<_, DonationEvent>(
            r#"
            SELECT id, player_tag, player_name, clan_tag, donations, received, time, reported, season_id
            FROM events
            WHERE reported = FALSE
            ORDER BY time ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}

#[derive(Debug, Clone, Copy)]
/// Flip `reported` to true for one event. Never reversed.
pub struct MarkEventReported {
    pub event_id: i64,
}

impl Processor<MarkEventReported> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkEventReported")]
    async fn process(&self, cmd: MarkEventReported) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE events SET reported = TRUE WHERE id = ? AND reported = FALSE",
        )
        .bind(cmd.event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
