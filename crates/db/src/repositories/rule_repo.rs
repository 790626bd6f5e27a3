//! Repository for the `rules` table.

use sqlx::PgConnection;
use tripwire_core::types::DbId;

use crate::models::rule::ActiveRule;

/// Provides the evaluation stage's rule queries.
pub struct RuleRepo;

impl RuleRepo {
    /// List every active rule together with its asset's name and status.
    pub async fn list_active(
        conn: &mut PgConnection,
        tenant: Option<DbId>,
    ) -> Result<Vec<ActiveRule>, sqlx::Error> {
        sqlx::query_as::<_, ActiveRule>(
            "SELECT r.id, r.tenant_id, r.asset_id, \
                    a.name AS asset_name, a.is_active AS asset_is_active, \
                    r.name, r.metric_name, r.operator_id, r.threshold, \
                    r.severity_id, r.frequency_id, r.required_consecutive_breaches, \
                    r.channel_type_id, r.notify_target \
             FROM rules r \
             JOIN assets a ON a.id = r.asset_id \
             WHERE r.is_active = true \
               AND ($1::BIGINT IS NULL OR r.tenant_id = $1) \
             ORDER BY r.id",
        )
        .bind(tenant)
        .fetch_all(&mut *conn)
        .await
    }

    /// Deactivate a rule. Returns `true` if it was active.
    pub async fn disable(conn: &mut PgConnection, rule_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rules SET is_active = false, updated_at = NOW() \
             WHERE id = $1 AND is_active = true",
        )
        .bind(rule_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
