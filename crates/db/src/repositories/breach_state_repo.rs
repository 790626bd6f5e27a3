//! Repository for the `breach_states` table.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tripwire_core::types::DbId;

use crate::models::breach_state::BreachStateRow;

/// Column list for `breach_states` queries.
const COLUMNS: &str = "\
    id, tenant_id, rule_id, consecutive_breaches, last_value, \
    last_evaluated_at, created_at, updated_at";

/// Provides lazy creation and updates of per-rule breach counters.
pub struct BreachStateRepo;

impl BreachStateRepo {
    /// Fetch the state for `(tenant_id, rule_id)`, inserting a zeroed row on
    /// first use.
    ///
    /// The no-op `DO UPDATE` makes `RETURNING` yield the existing row when
    /// another instance created it first.
    pub async fn get_or_create(
        conn: &mut PgConnection,
        tenant_id: DbId,
        rule_id: DbId,
    ) -> Result<BreachStateRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO breach_states (tenant_id, rule_id) \
             VALUES ($1, $2) \
             ON CONFLICT (tenant_id, rule_id) \
             DO UPDATE SET updated_at = breach_states.updated_at \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BreachStateRow>(&query)
            .bind(tenant_id)
            .bind(rule_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Persist the counter and last observed value after an evaluation.
    pub async fn save(
        conn: &mut PgConnection,
        tenant_id: DbId,
        rule_id: DbId,
        consecutive_breaches: i32,
        last_value: Option<Decimal>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE breach_states SET \
                consecutive_breaches = $3, \
                last_value = $4, \
                last_evaluated_at = NOW(), \
                updated_at = NOW() \
             WHERE tenant_id = $1 AND rule_id = $2",
        )
        .bind(tenant_id)
        .bind(rule_id)
        .bind(consecutive_breaches)
        .bind(last_value)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
