//! Metric definition and data point models.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use tripwire_core::types::{DbId, Timestamp};

/// A row from the `metrics` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MetricDefinition {
    pub id: DbId,
    pub asset_id: DbId,
    pub name: String,
    pub metric_type: String,
    pub is_active: bool,
}

/// DTO for appending a data point.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDataPoint {
    pub metric_id: DbId,
    pub value: Decimal,
    pub recorded_at: Timestamp,
}

/// The most recent value recorded for a metric.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LatestMetricValue {
    pub metric_id: DbId,
    pub value: Decimal,
    pub recorded_at: Timestamp,
}
