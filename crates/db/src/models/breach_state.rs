//! Breach state rows.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use tripwire_core::types::{DbId, Timestamp};

/// A row from the `breach_states` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BreachStateRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub rule_id: DbId,
    pub consecutive_breaches: i32,
    pub last_value: Option<Decimal>,
    pub last_evaluated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
