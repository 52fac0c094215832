//! Notification sink abstraction.
//!
//! The engine's only output is `notify(channel_id, payload)`; everything
//! behind that capability (HTTP transport, chat platform, test double) is
//! an implementation detail of the caller.

use crate::entities::events::DonationEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a notification sink.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The sink rejected the payload for this channel (e.g. HTTP 4xx).
    /// Retrying the same payload cannot succeed.
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Transient transport failure; the delivery may be retried.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Whether retrying this delivery could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transport(_))
    }
}

/// Capability for delivering one rendered payload to one channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, channel_id: i64, payload: &str) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<S: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<S> {
    async fn notify(&self, channel_id: i64, payload: &str) -> Result<(), DeliveryError> {
        (**self).notify(channel_id, payload).await
    }
}

/// Interpolate an event into a subscription's format template.
///
/// Recognized placeholders: `{player_name}`, `{player_tag}`, `{clan_tag}`,
/// `{donations}`, `{received}`. Unknown placeholders pass through
/// untouched. Substitution is a single pass over the template, so
/// placeholder-shaped text inside a substituted value is emitted verbatim
/// rather than re-interpolated.
pub fn render_live_format(fmt: &str, event: &DonationEvent) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut rest = fmt;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        match &tail[1..close] {
            "player_name" => out.push_str(&event.player_name),
            "player_tag" => out.push_str(&event.player_tag),
            "clan_tag" => out.push_str(&event.clan_tag),
            "donations" => out.push_str(&event.donations.to_string()),
            "received" => out.push_str(&event.received.to_string()),
            _ => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}
