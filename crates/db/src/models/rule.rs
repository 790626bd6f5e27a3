//! Rule rows as loaded by the evaluation stage.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use tripwire_core::types::{DbId, LookupId};

/// An active rule joined with the asset fields evaluation needs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveRule {
    pub id: DbId,
    pub tenant_id: DbId,
    pub asset_id: DbId,
    pub asset_name: String,
    pub asset_is_active: bool,
    pub name: String,
    pub metric_name: String,
    pub operator_id: LookupId,
    pub threshold: Decimal,
    pub severity_id: LookupId,
    pub frequency_id: LookupId,
    pub required_consecutive_breaches: i32,
    pub channel_type_id: LookupId,
    pub notify_target: String,
}
