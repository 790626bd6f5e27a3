//! Resolution of lookup codes to their database ids and back.
//!
//! Operators, severities, signal statuses and channel types are stored as
//! `SMALLINT` references into `lookup_codes`. Stages resolve them by
//! `(category, code)` at runtime rather than assuming seeded ids.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tripwire_core::types::LookupId;
use tripwire_db::models::lookup::LookupCode;
use tripwire_db::repositories::LookupRepo;
use tripwire_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Lookup code {category}/{code} not found")]
    CodeNotFound { category: String, code: String },

    #[error("Lookup id {category}/{id} not found")]
    IdNotFound { category: String, id: LookupId },

    #[error("Failed to load lookup codes: {0}")]
    Database(#[from] sqlx::Error),
}

/// Maps lookup codes to ids and ids to codes within a category.
#[async_trait]
pub trait LookupResolver: Send + Sync {
    async fn resolve_id(&self, category: &str, code: &str) -> Result<LookupId, LookupError>;

    async fn resolve_code(&self, category: &str, id: LookupId) -> Result<String, LookupError>;
}

/// An in-memory snapshot of the `lookup_codes` table.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    ids: HashMap<(String, String), LookupId>,
    codes: HashMap<(String, LookupId), String>,
}

impl LookupTable {
    pub fn from_rows(rows: impl IntoIterator<Item = LookupCode>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.insert(&row.category, &row.code, row.id);
        }
        table
    }

    pub fn insert(&mut self, category: &str, code: &str, id: LookupId) {
        self.ids
            .insert((category.to_string(), code.to_string()), id);
        self.codes
            .insert((category.to_string(), id), code.to_string());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn id(&self, category: &str, code: &str) -> Option<LookupId> {
        self.ids
            .get(&(category.to_string(), code.to_string()))
            .copied()
    }

    fn code(&self, category: &str, id: LookupId) -> Option<String> {
        self.codes.get(&(category.to_string(), id)).cloned()
    }
}

#[async_trait]
impl LookupResolver for LookupTable {
    async fn resolve_id(&self, category: &str, code: &str) -> Result<LookupId, LookupError> {
        self.id(category, code)
            .ok_or_else(|| LookupError::CodeNotFound {
                category: category.to_string(),
                code: code.to_string(),
            })
    }

    async fn resolve_code(&self, category: &str, id: LookupId) -> Result<String, LookupError> {
        self.code(category, id)
            .ok_or_else(|| LookupError::IdNotFound {
                category: category.to_string(),
                id,
            })
    }
}

/// Minimum time between reloads triggered by cache misses.
const MIN_RELOAD_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct LookupCache {
    table: Option<LookupTable>,
    loaded_at: Option<Instant>,
}

impl LookupCache {
    fn reload_due(&self, now: Instant) -> bool {
        self.loaded_at
            .map_or(true, |at| now.saturating_duration_since(at) >= MIN_RELOAD_INTERVAL)
    }

    /// Answer from the cached table, or `None` when the table must be
    /// (re)loaded first. A miss inside the reload interval is a final miss.
    fn answer<T>(
        &self,
        probe: &impl Fn(&LookupTable) -> Option<T>,
        now: Instant,
    ) -> Option<Option<T>> {
        let table = self.table.as_ref()?;
        match probe(table) {
            Some(found) => Some(Some(found)),
            None if self.reload_due(now) => None,
            None => Some(None),
        }
    }
}

/// Database-backed resolver with a process-wide cache.
///
/// The table is loaded on first use and reloaded on a miss, at most once per
/// `MIN_RELOAD_INTERVAL`, so codes added while the worker runs are picked up
/// without a restart and unknown ids do not reload the table for every rule.
pub struct CachedLookupResolver {
    pool: DbPool,
    cache: RwLock<LookupCache>,
}

impl CachedLookupResolver {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            cache: RwLock::new(LookupCache::default()),
        }
    }

    async fn find<T>(
        &self,
        probe: impl Fn(&LookupTable) -> Option<T>,
    ) -> Result<Option<T>, LookupError> {
        if let Some(answer) = self.cache.read().await.answer(&probe, Instant::now()) {
            return Ok(answer);
        }

        let mut cache = self.cache.write().await;
        // Another caller may have reloaded while this one waited for the lock.
        if let Some(answer) = cache.answer(&probe, Instant::now()) {
            return Ok(answer);
        }
        let rows = LookupRepo::list_all(&self.pool).await?;
        let table = LookupTable::from_rows(rows);
        tracing::debug!(codes = table.len(), "Lookup codes loaded");
        let found = probe(&table);
        cache.table = Some(table);
        cache.loaded_at = Some(Instant::now());
        Ok(found)
    }
}

#[async_trait]
impl LookupResolver for CachedLookupResolver {
    async fn resolve_id(&self, category: &str, code: &str) -> Result<LookupId, LookupError> {
        self.find(|table| table.id(category, code))
            .await?
            .ok_or_else(|| LookupError::CodeNotFound {
                category: category.to_string(),
                code: code.to_string(),
            })
    }

    async fn resolve_code(&self, category: &str, id: LookupId) -> Result<String, LookupError> {
        self.find(|table| table.code(category, id))
            .await?
            .ok_or_else(|| LookupError::IdNotFound {
                category: category.to_string(),
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tripwire_core::lookup::{CATEGORY_OPERATOR, CATEGORY_SEVERITY};

    fn row(id: LookupId, category: &str, code: &str) -> LookupCode {
        LookupCode {
            id,
            category: category.to_string(),
            code: code.to_string(),
            label: code.to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_both_directions() {
        let table = LookupTable::from_rows([
            row(1, CATEGORY_OPERATOR, "GT"),
            row(2, CATEGORY_OPERATOR, "LT"),
        ]);

        assert_eq!(table.resolve_id(CATEGORY_OPERATOR, "LT").await.unwrap(), 2);
        assert_eq!(table.resolve_code(CATEGORY_OPERATOR, 1).await.unwrap(), "GT");
    }

    #[tokio::test]
    async fn categories_do_not_overlap() {
        let table = LookupTable::from_rows([row(1, CATEGORY_OPERATOR, "GT")]);

        assert_matches!(
            table.resolve_code(CATEGORY_SEVERITY, 1).await,
            Err(LookupError::IdNotFound { id: 1, .. })
        );
        assert_matches!(
            table.resolve_id(CATEGORY_SEVERITY, "GT").await,
            Err(LookupError::CodeNotFound { .. })
        );
    }

    fn loaded_cache(at: Instant) -> LookupCache {
        LookupCache {
            table: Some(LookupTable::from_rows([row(1, CATEGORY_OPERATOR, "GT")])),
            loaded_at: Some(at),
        }
    }

    #[test]
    fn empty_cache_needs_a_load() {
        let cache = LookupCache::default();
        let probe = |t: &LookupTable| t.id(CATEGORY_OPERATOR, "GT");
        assert_eq!(cache.answer(&probe, Instant::now()), None);
    }

    #[test]
    fn cached_hit_is_answered_without_reload() {
        let now = Instant::now();
        let cache = loaded_cache(now);
        let probe = |t: &LookupTable| t.id(CATEGORY_OPERATOR, "GT");
        assert_eq!(cache.answer(&probe, now + MIN_RELOAD_INTERVAL * 2), Some(Some(1)));
    }

    #[test]
    fn miss_reloads_at_most_once_per_interval() {
        let loaded = Instant::now();
        let cache = loaded_cache(loaded);
        let probe = |t: &LookupTable| t.code(CATEGORY_OPERATOR, 99);

        assert_eq!(cache.answer(&probe, loaded + Duration::from_secs(1)), Some(None));
        assert_eq!(cache.answer(&probe, loaded + MIN_RELOAD_INTERVAL), None);
    }

    #[test]
    fn not_found_display() {
        let err = LookupError::CodeNotFound {
            category: "SIGNAL_STATUS".to_string(),
            code: "OPEN".to_string(),
        };
        assert_eq!(err.to_string(), "Lookup code SIGNAL_STATUS/OPEN not found");
    }
}
