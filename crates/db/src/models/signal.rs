//! Signal (alert event) models.

use rust_decimal::Decimal;
use tripwire_core::types::{DbId, LookupId, Timestamp};

/// DTO for opening a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSignal {
    pub tenant_id: DbId,
    pub rule_id: DbId,
    pub asset_id: DbId,
    pub status_id: LookupId,
    pub title: String,
    pub description: String,
    pub trigger_value: Decimal,
    pub threshold: Decimal,
    pub triggered_at: Timestamp,
}
