//! BroadcastRouter processor.
//!
//! The BroadcastRouter is responsible for:
//! - Polling unreported events (oldest first, bounded by `poll_limit`)
//! - Delivering each event to every registered live subscription
//! - Retrying transient failures with exponential backoff, bounded per
//!   (event, channel) pair
//! - Marking an event reported only once every subscription is handled
//!
//! An event whose retry budget is exhausted stays unreported and is
//! re-yielded by the next sweep: delivery is at-least-once, and a sink
//! that failed after actually delivering can produce a duplicate
//! notification. A permanent rejection counts the channel as handled so a
//! dead subscription cannot pin an event unreported forever.

use crate::entities::events::{DonationEvent, GetUnreportedEvents, MarkEventReported};
use crate::entities::subscriptions::{GetLiveSubscriptions, LiveSubscription};
use crate::events::RecordedTickReceiver;
use crate::framework::DatabaseProcessor;
use crate::sink::{render_live_format, NotificationSink};
use kanau::processor::Processor;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Base delay for the exponential delivery backoff.
const BASE_RETRY_DELAY_MS: u64 = 250;

/// Cap on the backoff exponent (250ms * 2^6 = 16s max).
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Errors that can occur during a broadcast sweep.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tuning knobs for the router.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Maximum unreported events fetched per sweep.
    pub poll_limit: i64,
    /// Delivery attempts per (event, channel) pair within one sweep.
    pub max_attempts: u32,
    /// Interval between periodic sweeps.
    pub sweep_interval: std::time::Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            poll_limit: 100,
            max_attempts: 3,
            sweep_interval: std::time::Duration::from_secs(30),
        }
    }
}

/// Counters from one sweep, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub events_polled: u32,
    pub events_reported: u32,
    pub deliveries: u32,
    pub failures: u32,
}

/// BroadcastRouter matches recorded events to subscribed channels.
pub struct BroadcastRouter<S: NotificationSink> {
    pool: SqlitePool,
    sink: S,
    config: BroadcastConfig,
}

impl<S: NotificationSink> BroadcastRouter<S> {
    pub fn new(pool: SqlitePool, sink: S, config: BroadcastConfig) -> Self {
        Self { pool, sink, config }
    }

    /// Run the BroadcastRouter until shutdown is signaled.
    ///
    /// Sweeps on every `RecordedTick` and on a periodic timer, so events
    /// recorded while the sink was down are eventually drained even if no
    /// new batches arrive.
    pub async fn run(
        self,
        mut tick_rx: RecordedTickReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("BroadcastRouter started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("BroadcastRouter received shutdown signal");
                        break;
                    }
                }

                Some(tick) = tick_rx.recv() => {
                    if tick.events_recorded == 0 {
                        continue;
                    }
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "Broadcast sweep failed");
                    }
                }

                _ = tokio::time::sleep(self.config.sweep_interval) => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "Broadcast sweep failed");
                    }
                }

                else => {
                    info!("RecordedTick channel closed");
                    break;
                }
            }
        }

        info!("BroadcastRouter shutdown complete");
    }

    /// One delivery pass over the unreported backlog.
    pub async fn sweep(&self) -> Result<SweepStats, BroadcastError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let subscriptions = db.process(GetLiveSubscriptions).await?;
        let events = db
            .process(GetUnreportedEvents {
                limit: self.config.poll_limit,
            })
            .await?;

        let mut stats = SweepStats {
            events_polled: events.len() as u32,
            ..SweepStats::default()
        };

        for event in &events {
            let (delivered, failed) = self.deliver_event(event, &subscriptions).await;
            stats.deliveries += delivered;
            stats.failures += failed;

            // Zero failed channels covers the no-subscriber case too: an
            // event nobody listens for is reported and retired.
            if failed == 0 {
                db.process(MarkEventReported { event_id: event.id }).await?;
                stats.events_reported += 1;
            }
        }

        if stats.events_polled > 0 {
            info!(
                events_polled = stats.events_polled,
                events_reported = stats.events_reported,
                deliveries = stats.deliveries,
                failures = stats.failures,
                "Broadcast sweep completed"
            );
        }

        Ok(stats)
    }

    /// Deliver one event to every subscription.
    ///
    /// Returns (successful deliveries, channels still undelivered). A
    /// permanently rejected channel counts as neither.
    async fn deliver_event(
        &self,
        event: &DonationEvent,
        subscriptions: &[LiveSubscription],
    ) -> (u32, u32) {
        let mut delivered = 0u32;
        let mut failed = 0u32;

        for subscription in subscriptions {
            let payload = render_live_format(&subscription.fmt, event);
            match self
                .deliver_with_retry(subscription.channel_id, &payload)
                .await
            {
                DeliveryVerdict::Delivered => delivered += 1,
                DeliveryVerdict::Rejected => {
                    warn!(
                        event_id = event.id,
                        channel_id = subscription.channel_id,
                        "Channel rejected payload, dropping delivery"
                    );
                }
                DeliveryVerdict::Exhausted => failed += 1,
            }
        }

        (delivered, failed)
    }

    async fn deliver_with_retry(&self, channel_id: i64, payload: &str) -> DeliveryVerdict {
        for attempt in 0..self.config.max_attempts {
            match self.sink.notify(channel_id, payload).await {
                Ok(()) => {
                    debug!(channel_id, attempt, "Notification delivered");
                    return DeliveryVerdict::Delivered;
                }
                Err(e) if !e.is_retryable() => {
                    warn!(channel_id, error = %e, "Notification rejected");
                    return DeliveryVerdict::Rejected;
                }
                Err(e) => {
                    warn!(
                        channel_id,
                        attempt,
                        error = %e,
                        "Notification attempt failed"
                    );
                    if attempt + 1 < self.config.max_attempts {
                        tokio::time::sleep(retry_delay(attempt)).await;
                    }
                }
            }
        }
        DeliveryVerdict::Exhausted
    }
}

enum DeliveryVerdict {
    Delivered,
    Rejected,
    Exhausted,
}

/// Calculate the delay before the next delivery attempt.
///
/// Exponential backoff: 250ms * 2^attempt, capped at 16 seconds.
pub fn retry_delay(attempt: u32) -> std::time::Duration {
    let millis = BASE_RETRY_DELAY_MS * 2u64.pow(attempt.min(MAX_BACKOFF_EXPONENT));
    std::time::Duration::from_millis(millis)
}
