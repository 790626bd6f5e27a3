//! Queued notification models.

use serde::Serialize;
use sqlx::FromRow;
use tripwire_core::types::{DbId, LookupId, Timestamp};

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub tenant_id: DbId,
    pub signal_id: DbId,
    pub channel_type_id: LookupId,
    pub payload: serde_json::Value,
    pub is_sent: bool,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for queueing a notification for an already-inserted signal.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateNotification {
    pub tenant_id: DbId,
    pub signal_id: DbId,
    pub channel_type_id: LookupId,
    pub payload: serde_json::Value,
}
