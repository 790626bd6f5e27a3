//! Repository for the `metrics` and `metric_data_points` tables.

use sqlx::PgConnection;
use tripwire_core::types::DbId;

use crate::models::metric::{CreateDataPoint, LatestMetricValue, MetricDefinition};

/// Column list for `metrics` queries.
const METRIC_COLUMNS: &str = "id, asset_id, name, metric_type, is_active";

/// Number of bind parameters per data point row.
const DATA_POINT_PARAMS: usize = 3;

/// Rows per INSERT statement. Postgres allows at most 65535 bind
/// parameters per statement.
const MAX_ROWS_PER_INSERT: usize = 5_000;

/// Provides metric definition lookups and append-only data point writes.
pub struct MetricRepo;

impl MetricRepo {
    /// List the active metric definitions of the given assets.
    pub async fn list_active_for_assets(
        conn: &mut PgConnection,
        asset_ids: &[DbId],
    ) -> Result<Vec<MetricDefinition>, sqlx::Error> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {METRIC_COLUMNS} FROM metrics \
             WHERE asset_id = ANY($1) AND is_active = true \
             ORDER BY asset_id, name"
        );
        sqlx::query_as::<_, MetricDefinition>(&query)
            .bind(asset_ids)
            .fetch_all(&mut *conn)
            .await
    }

    /// Append data points with multi-row INSERTs of at most
    /// `MAX_ROWS_PER_INSERT` rows each.
    ///
    /// Returns the number of rows written.
    pub async fn insert_data_points(
        conn: &mut PgConnection,
        points: &[CreateDataPoint],
    ) -> Result<u64, sqlx::Error> {
        let mut written = 0;
        for chunk in points.chunks(MAX_ROWS_PER_INSERT) {
            let query = insert_data_points_sql(chunk.len());
            let mut q = sqlx::query(&query);
            for p in chunk {
                q = q.bind(p.metric_id).bind(p.value).bind(p.recorded_at);
            }
            written += q.execute(&mut *conn).await?.rows_affected();
        }
        Ok(written)
    }

    /// Fetch the most recent value of the metric named `metric_name` on an
    /// asset, or `None` when the metric has no history yet.
    pub async fn latest_value(
        conn: &mut PgConnection,
        tenant_id: DbId,
        asset_id: DbId,
        metric_name: &str,
    ) -> Result<Option<LatestMetricValue>, sqlx::Error> {
        sqlx::query_as::<_, LatestMetricValue>(
            "SELECT dp.metric_id, dp.value, dp.recorded_at \
             FROM metric_data_points dp \
             JOIN metrics m ON m.id = dp.metric_id \
             JOIN assets a ON a.id = m.asset_id \
             WHERE m.asset_id = $1 \
               AND m.name = $2 \
               AND m.is_active = true \
               AND a.tenant_id = $3 \
             ORDER BY dp.recorded_at DESC, dp.id DESC \
             LIMIT 1",
        )
        .bind(asset_id)
        .bind(metric_name)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await
    }
}

/// Build the INSERT for `rows` data points with numbered placeholders.
fn insert_data_points_sql(rows: usize) -> String {
    let mut query =
        String::from("INSERT INTO metric_data_points (metric_id, value, recorded_at) VALUES ");
    let mut param_idx = 1usize;
    for i in 0..rows {
        if i > 0 {
            query.push_str(", ");
        }
        query.push('(');
        for j in 0..DATA_POINT_PARAMS {
            if j > 0 {
                query.push_str(", ");
            }
            query.push('$');
            query.push_str(&param_idx.to_string());
            param_idx += 1;
        }
        query.push(')');
    }
    query
}
