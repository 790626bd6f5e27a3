//! Repository for the `signals` table.

use sqlx::PgConnection;
use tripwire_core::types::DbId;

use crate::models::signal::CreateSignal;

/// Provides signal inserts.
pub struct SignalRepo;

impl SignalRepo {
    /// Open a signal, returning its generated ID.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateSignal,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO signals \
                (tenant_id, rule_id, asset_id, status_id, title, description, \
                 trigger_value, threshold, triggered_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id",
        )
        .bind(input.tenant_id)
        .bind(input.rule_id)
        .bind(input.asset_id)
        .bind(input.status_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.trigger_value)
        .bind(input.threshold)
        .bind(input.triggered_at)
        .fetch_one(&mut *conn)
        .await
    }
}
