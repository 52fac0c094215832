//! Season rows. A season is an administratively bounded time window; the
//! engine only ever reads them. Boundaries are half-open unix-second
//! intervals: a season is active for `start <= now < finish`.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Season {
    pub id: i64,
    pub start: i64,
    pub finish: i64,
}

#[derive(Debug, Clone, Copy)]
/// Find the season whose [start, finish) interval contains `now`.
pub struct GetActiveSeason {
    pub now: i64,
}

impl Processor<GetActiveSeason> for DatabaseProcessor {
    type Output = Option<Season>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveSeason")]
    async fn process(&self, query: GetActiveSeason) -> Result<Option<Season>, sqlx::Error> {
        let season = sqlx::query_as::<_, Season>(
            r#"
            SELECT id, start, finish
            FROM seasons
            WHERE start <= ? AND finish > ?
            ORDER BY start DESC
            LIMIT 1
            "#,
        )
        .bind(query.now)
        .bind(query.now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(season)
    }
}

#[derive(Debug, Clone, Copy)]
/// Insert a season row. This is an administrative operation; the engine
/// itself never creates seasons, but tests and operator tooling do.
pub struct CreateSeason {
    pub start: i64,
    pub finish: i64,
}

impl Processor<CreateSeason> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateSeason")]
    async fn process(&self, cmd: CreateSeason) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO seasons (start, finish) VALUES (?, ?) RETURNING id",
        )
        .bind(cmd.start)
        .bind(cmd.finish)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}
