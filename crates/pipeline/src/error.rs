use tripwire_core::error::CoreError;
use tripwire_events::DeliveryError;

use crate::lookup::LookupError;
use crate::source::SourceError;

/// Failures that abort a cycle, or a single item within one.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Invalid notification payload: {0}")]
    Payload(#[from] serde_json::Error),
}
