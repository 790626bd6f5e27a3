//! Chat delivery through incoming-webhook style endpoints.
//!
//! Chat services (Slack, Mattermost, Teams connectors, ...) accept a small
//! `{"text": ...}` document rather than the full notification payload.

use crate::channel::OutboundMessage;
use crate::delivery::webhook::{post_json, WebhookError};

/// Delivers notifications as chat messages.
pub struct ChatDelivery {
    client: reqwest::Client,
}

impl ChatDelivery {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Post the rendered message text to the chat endpoint.
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<(), WebhookError> {
        post_json(&self.client, &message.target, &chat_body(message)).await?;
        tracing::debug!(
            notification_id = message.notification_id,
            "Chat message delivered"
        );
        Ok(())
    }
}

/// Render the chat document: bold subject line followed by the body.
fn chat_body(message: &OutboundMessage) -> serde_json::Value {
    serde_json::json!({
        "text": format!("*{}*\n{}", message.subject, message.body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_combines_subject_and_body() {
        let message = OutboundMessage {
            notification_id: 9,
            target: "https://chat.example.com/hook".to_string(),
            subject: "High CPU: cpu_usage > 90".to_string(),
            body: "cpu_usage on asset web-01 reported 97".to_string(),
            payload: serde_json::json!({ "ignored": true }),
        };
        let body = chat_body(&message);
        assert_eq!(
            body["text"],
            "*High CPU: cpu_usage > 90*\ncpu_usage on asset web-01 reported 97"
        );
        assert!(body.get("ignored").is_none());
    }
}
