//! Channel kinds, outbound messages and the delivery seam.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use tripwire_core::error::CoreError;
use tripwire_core::lookup::{CATEGORY_CHANNEL_TYPE, CHANNEL_CHAT, CHANNEL_EMAIL, CHANNEL_WEBHOOK};
use tripwire_core::types::DbId;

use crate::delivery::email::EmailError;
use crate::delivery::webhook::WebhookError;

// ---------------------------------------------------------------------------
// ChannelKind
// ---------------------------------------------------------------------------

/// Supported notification channel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChannelKind {
    Email,
    Webhook,
    Chat,
}

impl ChannelKind {
    /// The `CHANNEL_TYPE` lookup code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            Self::Email => CHANNEL_EMAIL,
            Self::Webhook => CHANNEL_WEBHOOK,
            Self::Chat => CHANNEL_CHAT,
        }
    }
}

impl FromStr for ChannelKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            CHANNEL_EMAIL => Ok(Self::Email),
            CHANNEL_WEBHOOK => Ok(Self::Webhook),
            CHANNEL_CHAT => Ok(Self::Chat),
            _ => Err(CoreError::UnknownCode {
                category: CATEGORY_CHANNEL_TYPE,
                code: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// OutboundMessage
// ---------------------------------------------------------------------------

/// A notification rendered for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub notification_id: DbId,
    /// Email address or URL, depending on the channel.
    pub target: String,
    pub subject: String,
    pub body: String,
    /// Full notification payload; posted verbatim by the webhook channel.
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single delivery attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Email(#[from] EmailError),

    /// The channel exists but is not configured on this instance.
    #[error("Channel {0} is not configured")]
    Unavailable(ChannelKind),
}

// ---------------------------------------------------------------------------
// ChannelSender
// ---------------------------------------------------------------------------

/// Attempts one delivery of a message over a channel.
///
/// Implementations must not retry internally; the dispatch stage owns the
/// retry budget and counts every attempt.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, kind: ChannelKind, message: &OutboundMessage)
        -> Result<(), DeliveryError>;
}
