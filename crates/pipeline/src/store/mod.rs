//! The persistence seam used by every stage.
//!
//! A cycle opens one [`UnitOfWork`] through [`AlertStore::begin`], performs
//! all reads and writes through it and calls [`UnitOfWork::commit`] once.
//! Dropping a unit of work without committing discards its writes, so a
//! cycle that bails out early never leaves partial state behind.
//!
//! Items within a cycle are isolated with savepoints: a stage calls
//! [`UnitOfWork::savepoint`] before an item and either releases it or rolls
//! back to it, so a failing item does not poison the rest of the cycle.

pub mod postgres;

use async_trait::async_trait;
use tripwire_core::breach::BreachState;
use tripwire_core::tenant::TenantScope;
use tripwire_core::types::{DbId, Timestamp};
use tripwire_db::models::asset::DueAsset;
use tripwire_db::models::breach_state::BreachStateRow;
use tripwire_db::models::metric::{CreateDataPoint, LatestMetricValue, MetricDefinition};
use tripwire_db::models::notification::{CreateNotification, Notification};
use tripwire_db::models::rule::ActiveRule;
use tripwire_db::models::signal::CreateSignal;

/// Opens per-cycle units of work.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn begin(&self, scope: TenantScope) -> Result<Box<dyn UnitOfWork>, sqlx::Error>;
}

/// One cycle's transactional view of the alerting tables.
#[async_trait]
pub trait UnitOfWork: Send {
    /// The tenant scope this unit of work was opened with.
    fn scope(&self) -> TenantScope;

    async fn savepoint(&mut self) -> Result<(), sqlx::Error>;
    async fn release_savepoint(&mut self) -> Result<(), sqlx::Error>;
    async fn rollback_to_savepoint(&mut self) -> Result<(), sqlx::Error>;

    // -- ingestion ----------------------------------------------------------

    /// Up to `limit` active assets due at `now`, oldest due first.
    async fn due_assets(&mut self, now: Timestamp, limit: i64)
        -> Result<Vec<DueAsset>, sqlx::Error>;

    /// Active metric definitions of the given assets.
    async fn active_metrics(
        &mut self,
        asset_ids: &[DbId],
    ) -> Result<Vec<MetricDefinition>, sqlx::Error>;

    async fn insert_data_points(&mut self, points: &[CreateDataPoint]) -> Result<u64, sqlx::Error>;

    async fn advance_cursor(
        &mut self,
        asset_id: DbId,
        next_due_at: Timestamp,
    ) -> Result<(), sqlx::Error>;

    // -- evaluation ---------------------------------------------------------

    /// Active rules joined with their asset.
    async fn active_rules(&mut self) -> Result<Vec<ActiveRule>, sqlx::Error>;

    async fn disable_rule(&mut self, rule_id: DbId) -> Result<(), sqlx::Error>;

    /// Latest value of `metric_name` on the asset, `None` without history.
    async fn latest_metric_value(
        &mut self,
        tenant_id: DbId,
        asset_id: DbId,
        metric_name: &str,
    ) -> Result<Option<LatestMetricValue>, sqlx::Error>;

    /// Load the rule's breach state, creating a zeroed one on first use.
    async fn breach_state(
        &mut self,
        tenant_id: DbId,
        rule_id: DbId,
    ) -> Result<BreachStateRow, sqlx::Error>;

    async fn save_breach_state(
        &mut self,
        tenant_id: DbId,
        rule_id: DbId,
        state: &BreachState,
    ) -> Result<(), sqlx::Error>;

    /// Insert a signal and return its durable id.
    async fn insert_signal(&mut self, signal: &CreateSignal) -> Result<DbId, sqlx::Error>;

    /// Queue a notification for a signal inserted earlier in this unit of work.
    async fn insert_notification(
        &mut self,
        notification: &CreateNotification,
    ) -> Result<DbId, sqlx::Error>;

    // -- dispatch -----------------------------------------------------------

    /// Up to `limit` unsent notifications, FIFO, retry-eligible rows first.
    async fn unsent_notifications(
        &mut self,
        max_retry_count: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error>;

    async fn mark_sent(&mut self, notification_id: DbId) -> Result<(), sqlx::Error>;

    async fn record_failure(
        &mut self,
        notification_id: DbId,
        reason: &str,
    ) -> Result<(), sqlx::Error>;

    // -- completion ---------------------------------------------------------

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;
}
