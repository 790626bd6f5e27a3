//! Tripwire outbound notification delivery.
//!
//! - [`ChannelSender`]: the single-attempt delivery seam used by the dispatch
//!   stage, keyed by [`ChannelKind`].
//! - [`delivery`]: webhook, chat and email transports.
//! - [`ChannelDispatcher`]: the production [`ChannelSender`] routing each
//!   kind to its transport.

pub mod channel;
pub mod delivery;
pub mod dispatcher;

pub use channel::{ChannelKind, ChannelSender, DeliveryError, OutboundMessage};
pub use delivery::chat::ChatDelivery;
pub use delivery::email::{
    EmailConfig, EmailDelivery, DEFAULT_FROM_ADDRESS, DEFAULT_SMTP_PORT,
};
pub use delivery::webhook::WebhookDelivery;
pub use dispatcher::ChannelDispatcher;
