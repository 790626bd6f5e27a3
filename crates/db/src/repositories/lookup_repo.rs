//! Repository for the `lookup_codes` table.

use sqlx::PgPool;

use crate::models::lookup::LookupCode;

/// Provides read access to lookup codes.
pub struct LookupRepo;

impl LookupRepo {
    /// List every lookup code.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<LookupCode>, sqlx::Error> {
        sqlx::query_as::<_, LookupCode>(
            "SELECT id, category, code, label FROM lookup_codes ORDER BY category, id",
        )
        .fetch_all(pool)
        .await
    }
}
