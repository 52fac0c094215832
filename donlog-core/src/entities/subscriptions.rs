//! Live-feed channel subscriptions. Each row registers a notification
//! channel together with the format template its messages are rendered
//! with. The broadcast router treats these as read-only configuration;
//! registration itself is driven by external collaborators.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LiveSubscription {
    pub channel_id: i64,
    pub fmt: String,
}

#[derive(Debug, Clone, Copy)]
/// Fetch every registered subscription.
pub struct GetLiveSubscriptions;

impl Processor<GetLiveSubscriptions> for DatabaseProcessor {
    type Output = Vec<LiveSubscription>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLiveSubscriptions")]
    async fn process(&self, _query: GetLiveSubscriptions) -> Result<Vec<LiveSubscription>, sqlx::Error> {
        let subscriptions = sqlx::query_as::<_, LiveSubscription>(
            "SELECT channel_id, fmt FROM tempevents ORDER BY channel_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }
}

#[derive(Debug, Clone)]
/// Register a channel for the live feed with its format template.
pub struct AddLiveSubscription {
    pub channel_id: i64,
    pub fmt: String,
}

impl Processor<AddLiveSubscription> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AddLiveSubscription")]
    async fn process(&self, cmd: AddLiveSubscription) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO tempevents (channel_id, fmt) VALUES (?, ?)")
            .bind(cmd.channel_id)
            .bind(&cmd.fmt)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
