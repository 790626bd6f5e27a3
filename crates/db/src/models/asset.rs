//! Asset entity models.

use serde::Serialize;
use sqlx::FromRow;
use tripwire_core::types::{DbId, Timestamp};

/// An active asset whose ingestion cursor has come due.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DueAsset {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub data_source_code: String,
    pub external_ref: String,
    pub collection_interval_secs: i32,
    pub next_due_at: Timestamp,
}
