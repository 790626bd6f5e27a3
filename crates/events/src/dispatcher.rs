//! Production [`ChannelSender`] routing each channel kind to its transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::channel::{ChannelKind, ChannelSender, DeliveryError, OutboundMessage};
use crate::delivery::chat::ChatDelivery;
use crate::delivery::email::EmailDelivery;
use crate::delivery::webhook::{WebhookDelivery, WebhookError};

/// Routes outbound messages to the webhook, chat or email transport.
///
/// Webhook and chat share one HTTP client. Email is optional: without SMTP
/// configuration every email attempt fails with
/// [`DeliveryError::Unavailable`] and consumes retry budget like any other
/// failure.
pub struct ChannelDispatcher {
    webhook: WebhookDelivery,
    chat: ChatDelivery,
    email: Option<EmailDelivery>,
}

impl ChannelDispatcher {
    pub fn new(http_timeout: Duration, email: Option<EmailDelivery>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            webhook: WebhookDelivery::with_client(client.clone()),
            chat: ChatDelivery::with_client(client),
            email,
        })
    }
}

#[async_trait]
impl ChannelSender for ChannelDispatcher {
    async fn send(
        &self,
        kind: ChannelKind,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        match kind {
            ChannelKind::Webhook => self.webhook.deliver(message).await?,
            ChannelKind::Chat => self.chat.deliver(message).await?,
            ChannelKind::Email => match &self.email {
                Some(email) => email.deliver(message).await?,
                None => return Err(DeliveryError::Unavailable(ChannelKind::Email)),
            },
        }
        Ok(())
    }
}
