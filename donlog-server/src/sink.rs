//! Webhook implementation of the notification sink.
//!
//! Delivers rendered payloads as JSON POSTs to a single configured
//! endpoint; the receiving side fans out to the actual chat channels.

use async_trait::async_trait;
use donlog_core::sink::{DeliveryError, NotificationSink};
use serde::Serialize;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    channel_id: i64,
    content: &'a str,
}

/// Sink that posts notifications to an HTTP endpoint.
pub struct WebhookSink {
    endpoint: String,
    http_client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(endpoint: String, timeout: std::time::Duration) -> Self {
        Self {
            endpoint,
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, channel_id: i64, payload: &str) -> Result<(), DeliveryError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&WebhookPayload {
                channel_id,
                content: payload,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            // The endpoint will never accept this payload for this channel.
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(DeliveryError::Transport(format!(
                "endpoint returned status {status}"
            )))
        }
    }
}
