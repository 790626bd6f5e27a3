//! Webhook delivery.
//!
//! [`WebhookDelivery`] POSTs a notification's JSON payload to its target URL.
//! A non-2xx response is a failed attempt.

use crate::channel::OutboundMessage;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers notification payloads to external webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a delivery service sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST the message payload to its target URL.
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<(), WebhookError> {
        post_json(&self.client, &message.target, &message.payload).await?;
        tracing::debug!(
            notification_id = message.notification_id,
            url = %message.target,
            "Webhook delivered"
        );
        Ok(())
    }
}

/// Execute a single POST request and check the response status.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
) -> Result<(), WebhookError> {
    let response = client.post(url).json(payload).send().await?;
    if !response.status().is_success() {
        return Err(WebhookError::HttpStatus(response.status().as_u16()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
