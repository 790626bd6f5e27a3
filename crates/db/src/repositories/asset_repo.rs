//! Repository for the `assets` table.

use sqlx::PgConnection;
use tripwire_core::types::{DbId, Timestamp};

use crate::models::asset::DueAsset;

/// Column list for due-asset queries.
const DUE_COLUMNS: &str = "\
    id, tenant_id, name, data_source_code, external_ref, \
    collection_interval_secs, next_due_at";

/// Provides cursor queries for assets.
pub struct AssetRepo;

impl AssetRepo {
    /// List up to `limit` active assets whose cursor is at or before `now`.
    ///
    /// Oldest-due first so that no asset is starved when more assets are due
    /// than a single cycle processes.
    pub async fn list_due(
        conn: &mut PgConnection,
        tenant: Option<DbId>,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<DueAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {DUE_COLUMNS} FROM assets \
             WHERE is_active = true \
               AND next_due_at <= $1 \
               AND ($2::BIGINT IS NULL OR tenant_id = $2) \
             ORDER BY next_due_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, DueAsset>(&query)
            .bind(now)
            .bind(tenant)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await
    }

    /// Move an asset's cursor. Last writer wins.
    ///
    /// Returns `true` if the asset exists.
    pub async fn advance_cursor(
        conn: &mut PgConnection,
        asset_id: DbId,
        next_due_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assets SET next_due_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(asset_id)
        .bind(next_due_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
