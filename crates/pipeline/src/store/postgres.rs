//! PostgreSQL-backed [`AlertStore`].

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tripwire_core::breach::BreachState;
use tripwire_core::tenant::TenantScope;
use tripwire_core::types::{DbId, Timestamp};
use tripwire_db::models::asset::DueAsset;
use tripwire_db::models::breach_state::BreachStateRow;
use tripwire_db::models::metric::{CreateDataPoint, LatestMetricValue, MetricDefinition};
use tripwire_db::models::notification::{CreateNotification, Notification};
use tripwire_db::models::rule::ActiveRule;
use tripwire_db::models::signal::CreateSignal;
use tripwire_db::repositories::{
    AssetRepo, BreachStateRepo, MetricRepo, NotificationRepo, RuleRepo, SignalRepo,
};
use tripwire_db::DbPool;

use super::{AlertStore, UnitOfWork};

/// Savepoint name used for per-item isolation. Items never nest.
const ITEM_SAVEPOINT: &str = "tripwire_item";

/// Opens one database transaction per cycle.
#[derive(Clone)]
pub struct PgAlertStore {
    pool: DbPool,
}

impl PgAlertStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn begin(&self, scope: TenantScope) -> Result<Box<dyn UnitOfWork>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx, scope }))
    }
}

/// A cycle transaction. Rolled back by `sqlx` when dropped uncommitted.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    scope: TenantScope,
}

impl PgUnitOfWork {
    async fn execute_raw(&mut self, statement: String) -> Result<(), sqlx::Error> {
        sqlx::query(&statement).execute(&mut *self.tx).await?;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn scope(&self) -> TenantScope {
        self.scope
    }

    async fn savepoint(&mut self) -> Result<(), sqlx::Error> {
        self.execute_raw(format!("SAVEPOINT {ITEM_SAVEPOINT}")).await
    }

    async fn release_savepoint(&mut self) -> Result<(), sqlx::Error> {
        self.execute_raw(format!("RELEASE SAVEPOINT {ITEM_SAVEPOINT}"))
            .await
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), sqlx::Error> {
        self.execute_raw(format!("ROLLBACK TO SAVEPOINT {ITEM_SAVEPOINT}"))
            .await?;
        self.execute_raw(format!("RELEASE SAVEPOINT {ITEM_SAVEPOINT}"))
            .await
    }

    async fn due_assets(
        &mut self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<DueAsset>, sqlx::Error> {
        AssetRepo::list_due(&mut self.tx, self.scope.filter(), now, limit).await
    }

    async fn active_metrics(
        &mut self,
        asset_ids: &[DbId],
    ) -> Result<Vec<MetricDefinition>, sqlx::Error> {
        MetricRepo::list_active_for_assets(&mut self.tx, asset_ids).await
    }

    async fn insert_data_points(&mut self, points: &[CreateDataPoint]) -> Result<u64, sqlx::Error> {
        MetricRepo::insert_data_points(&mut self.tx, points).await
    }

    async fn advance_cursor(
        &mut self,
        asset_id: DbId,
        next_due_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        if !AssetRepo::advance_cursor(&mut self.tx, asset_id, next_due_at).await? {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn active_rules(&mut self) -> Result<Vec<ActiveRule>, sqlx::Error> {
        RuleRepo::list_active(&mut self.tx, self.scope.filter()).await
    }

    async fn disable_rule(&mut self, rule_id: DbId) -> Result<(), sqlx::Error> {
        RuleRepo::disable(&mut self.tx, rule_id).await?;
        Ok(())
    }

    async fn latest_metric_value(
        &mut self,
        tenant_id: DbId,
        asset_id: DbId,
        metric_name: &str,
    ) -> Result<Option<LatestMetricValue>, sqlx::Error> {
        MetricRepo::latest_value(&mut self.tx, tenant_id, asset_id, metric_name).await
    }

    async fn breach_state(
        &mut self,
        tenant_id: DbId,
        rule_id: DbId,
    ) -> Result<BreachStateRow, sqlx::Error> {
        BreachStateRepo::get_or_create(&mut self.tx, tenant_id, rule_id).await
    }

    async fn save_breach_state(
        &mut self,
        tenant_id: DbId,
        rule_id: DbId,
        state: &BreachState,
    ) -> Result<(), sqlx::Error> {
        let consecutive = i32::try_from(state.consecutive_breaches()).unwrap_or(i32::MAX);
        BreachStateRepo::save(&mut self.tx, tenant_id, rule_id, consecutive, state.last_value())
            .await
    }

    async fn insert_signal(&mut self, signal: &CreateSignal) -> Result<DbId, sqlx::Error> {
        SignalRepo::create(&mut self.tx, signal).await
    }

    async fn insert_notification(
        &mut self,
        notification: &CreateNotification,
    ) -> Result<DbId, sqlx::Error> {
        NotificationRepo::create(&mut self.tx, notification).await
    }

    async fn unsent_notifications(
        &mut self,
        max_retry_count: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        NotificationRepo::list_unsent(&mut self.tx, self.scope.filter(), max_retry_count, limit)
            .await
    }

    async fn mark_sent(&mut self, notification_id: DbId) -> Result<(), sqlx::Error> {
        if !NotificationRepo::mark_sent(&mut self.tx, notification_id).await? {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn record_failure(
        &mut self,
        notification_id: DbId,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        NotificationRepo::record_failure(&mut self.tx, notification_id, reason).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
