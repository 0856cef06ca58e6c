use futures::future::BoxFuture;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, Statement};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::{
    AccessError, CacheKey, ConnectionProvider, QueryCache, RetryPolicy, Row, fetch_rows,
    transactional,
};

/// Builder that stacks the access wrappers around an operation.
///
/// The order is fixed: the connection is acquired first and released last,
/// retries happen inside it, and each attempt of a transactional operation
/// gets its own transaction. A cache lookup happens before any connection
/// is opened.
#[derive(Debug, Clone)]
pub struct AccessChain {
    provider: ConnectionProvider,
    retry: Option<RetryPolicy>,
    cache: Option<Arc<QueryCache>>,
}

impl AccessChain {
    #[must_use]
    pub const fn new(provider: ConnectionProvider) -> Self {
        Self {
            provider,
            retry: None,
            cache: None,
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    fn policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_else(RetryPolicy::once)
    }

    /// Connection, then retry, then `op`.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: Fn(DatabaseConnection) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AccessError> + fmt::Display,
    {
        let policy = self.policy();
        self.provider
            .with_connection(|conn| async move { policy.run(|| op(conn.clone())).await })
            .await
    }

    /// Connection, then retry, then transaction, then `op`.
    pub async fn run_in_transaction<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>>,
        E: From<AccessError> + From<DbErr> + fmt::Display,
    {
        let policy = self.policy();
        let op = &op;
        self.provider
            .with_connection(|conn| async move {
                policy.run(|| transactional(&conn, op)).await
            })
            .await
    }

    /// Fetch rows for `stmt`, served from the cache when one is attached.
    pub async fn fetch(&self, stmt: Statement) -> Result<Arc<Vec<Row>>, AccessError> {
        let key = CacheKey::from_statement(&stmt);
        let query = || {
            self.run(|conn| {
                let stmt = stmt.clone();
                async move { fetch_rows(&conn, stmt).await.map_err(AccessError::from) }
            })
        };

        match &self.cache {
            Some(cache) => cache.get_or_fetch(key, query).await,
            None => Ok(Arc::new(query().await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DbBackend};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn seeded_provider(tag: &str) -> (std::path::PathBuf, ConnectionProvider) {
        let path = std::env::temp_dir().join(format!("missive-{tag}-{}.db", uuid::Uuid::new_v4()));
        std::fs::File::create(&path).unwrap();
        let provider = ConnectionProvider::new("users", format!("sqlite:{}", path.display()));

        provider
            .with_connection(|conn| async move {
                conn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT, age INTEGER)"
                        .to_string(),
                ))
                .await?;
                conn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO users (name, email, age) VALUES \
                     ('alice', 'alice@example.com', 30), ('bob', 'bob@example.com', 52)"
                        .to_string(),
                ))
                .await?;
                Ok::<(), AccessError>(())
            })
            .await
            .unwrap();

        (path, provider)
    }

    #[tokio::test]
    async fn test_run_retries_inside_one_connection() {
        let (path, provider) = seeded_provider("chain-retry").await;
        let chain = AccessChain::new(provider).with_retry(RetryPolicy::new(3, Duration::ZERO));
        let attempts = AtomicU32::new(0);

        let rows = chain
            .run(|conn| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    let sql = if attempt < 3 {
                        "SELECT * FROM userz"
                    } else {
                        "SELECT * FROM users"
                    };
                    let stmt = Statement::from_string(DbBackend::Sqlite, sql.to_string());
                    Ok::<_, AccessError>(fetch_rows(&conn, stmt).await?)
                }
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_each_failed_attempt() {
        let (path, provider) = seeded_provider("chain-txn").await;
        let chain = AccessChain::new(provider).with_retry(RetryPolicy::new(2, Duration::ZERO));

        let result: Result<(), AccessError> = chain
            .run_in_transaction(|txn| {
                Box::pin(async move {
                    txn.execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "UPDATE users SET email = 'changed@example.com' WHERE name = 'alice'"
                            .to_string(),
                    ))
                    .await?;
                    Err(AccessError::Database(DbErr::Custom("fail after write".into())))
                })
            })
            .await;
        assert!(result.is_err());

        let rows = chain
            .fetch(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT email FROM users WHERE name = 'alice'".to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(rows[0]["email"], "alice@example.com");
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_cached_fetch_skips_the_database() {
        let (path, provider) = seeded_provider("chain-cache").await;
        let cache = Arc::new(QueryCache::new());
        let chain = AccessChain::new(provider).with_cache(Arc::clone(&cache));
        let stmt = Statement::from_string(DbBackend::Sqlite, "SELECT * FROM users".to_string());

        let first = chain.fetch(stmt.clone()).await.unwrap();
        assert_eq!(first.len(), 2);

        let _ = std::fs::remove_file(&path);

        // The backing file is gone; only the cache can answer.
        let second = chain.fetch(stmt).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().await.hits, 1);
    }
}
