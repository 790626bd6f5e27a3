//! Lookup code rows.

use serde::Serialize;
use sqlx::FromRow;
use tripwire_core::types::LookupId;

/// A row from the `lookup_codes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LookupCode {
    pub id: LookupId,
    pub category: String,
    pub code: String,
    pub label: String,
}
