//! Repository for the `notifications` table.

use sqlx::PgConnection;
use tripwire_core::types::DbId;

use crate::models::notification::{CreateNotification, Notification};

/// Column list for `notifications` queries.
const COLUMNS: &str = "\
    id, tenant_id, signal_id, channel_type_id, payload, is_sent, retry_count, \
    last_error, last_attempt_at, sent_at, created_at";

/// Provides queue operations for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Queue a notification for an existing signal, returning the generated ID.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateNotification,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notifications (tenant_id, signal_id, channel_type_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(input.tenant_id)
        .bind(input.signal_id)
        .bind(input.channel_type_id)
        .bind(&input.payload)
        .fetch_one(&mut *conn)
        .await
    }

    /// List up to `limit` unsent notifications in FIFO order.
    ///
    /// Rows that still have retry budget sort before exhausted ones so that
    /// exhausted rows cannot crowd eligible ones out of the batch.
    pub async fn list_unsent(
        conn: &mut PgConnection,
        tenant: Option<DbId>,
        max_retry_count: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE is_sent = false \
               AND ($1::BIGINT IS NULL OR tenant_id = $1) \
             ORDER BY (retry_count >= $2) ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(tenant)
            .bind(max_retry_count)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await
    }

    /// Mark a notification as delivered. `retry_count` is left unchanged.
    pub async fn mark_sent(
        conn: &mut PgConnection,
        notification_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_sent = true, sent_at = NOW(), last_attempt_at = NOW() \
             WHERE id = $1",
        )
        .bind(notification_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed delivery attempt: bump `retry_count` by one and store
    /// the reason.
    pub async fn record_failure(
        conn: &mut PgConnection,
        notification_id: DbId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET retry_count = retry_count + 1, last_error = $2, last_attempt_at = NOW() \
             WHERE id = $1 AND is_sent = false",
        )
        .bind(notification_id)
        .bind(reason)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
