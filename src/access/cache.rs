use sea_orm::Statement;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::Row;

/// Identity of a cached result: statement text plus its bound values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sql: String,
    params: Vec<String>,
}

impl CacheKey {
    /// Key for a statement without bound values.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_statement(stmt: &Statement) -> Self {
        let params = stmt
            .values
            .as_ref()
            .map(|values| values.0.iter().map(|v| format!("{v:?}")).collect())
            .unwrap_or_default();

        Self {
            sql: stmt.sql.clone(),
            params,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Memoized query results.
///
/// Entries never expire and the map is unbounded; the last insert for a key
/// wins. Owned explicitly and shared through `Arc`.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<CacheKey, Arc<Vec<Row>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Row>>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, rows: Vec<Row>) -> Arc<Vec<Row>> {
        let rows = Arc::new(rows);
        self.entries.write().await.insert(key, Arc::clone(&rows));
        rows
    }

    /// Return the cached rows for `key`, or run `fetch` and store its rows.
    ///
    /// The lock is not held while `fetch` runs, so two concurrent misses on
    /// the same key both execute and the later one overwrites the entry.
    pub async fn get_or_fetch<E, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<Vec<Row>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Row>, E>>,
    {
        if let Some(rows) = self.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(query = %key.sql, "Cache hit");
            return Ok(rows);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(query = %key.sql, "Cache miss, running query");

        let rows = fetch().await?;
        Ok(self.insert(key, rows).await)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbBackend;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cache = QueryCache::new();
        let executions = AtomicU32::new(0);
        let key = CacheKey::new("SELECT * FROM users");

        let fetch = || async {
            executions.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(vec![json!({"id": 1, "username": "alice"})])
        };

        let first = cache.get_or_fetch(key.clone(), fetch).await.unwrap();
        let second = cache.get_or_fetch(key, fetch).await.unwrap();

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = QueryCache::new();
        let key = CacheKey::new("SELECT * FROM users");

        let failed: Result<_, String> = cache
            .get_or_fetch(key.clone(), || async { Err("locked".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);

        let rows = cache
            .get_or_fetch(key, || async { Ok::<_, String>(vec![json!({"id": 2})]) })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_bound_values_are_part_of_the_key() {
        let sql = "SELECT * FROM users WHERE age > ?";
        let older_than_25 =
            Statement::from_sql_and_values(DbBackend::Sqlite, sql, [25.into()]);
        let older_than_40 =
            Statement::from_sql_and_values(DbBackend::Sqlite, sql, [40.into()]);

        let a = CacheKey::from_statement(&older_than_25);
        let b = CacheKey::from_statement(&older_than_40);

        assert_ne!(a, b);
        assert_eq!(a, CacheKey::from_statement(&older_than_25));
        assert_eq!(a.sql(), b.sql());
    }

    #[test]
    fn test_plain_statement_matches_text_key() {
        let stmt = Statement::from_string(DbBackend::Sqlite, "SELECT 1".to_string());
        assert_eq!(CacheKey::from_statement(&stmt), CacheKey::new("SELECT 1"));
    }
}
