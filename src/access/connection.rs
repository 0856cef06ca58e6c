use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbBackend};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::AccessError;

/// Opens a dedicated handle to a named database for one unit of work.
///
/// Every acquisition gets its own single-connection handle; handles are
/// never pooled or shared between concurrent operations.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    name: String,
    url: String,
}

impl ConnectionProvider {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.access.database_name.clone(),
            config.access_database_url(),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn backend(&self) -> DbBackend {
        if self.url.starts_with("postgres") {
            DbBackend::Postgres
        } else if self.url.starts_with("mysql") {
            DbBackend::MySql
        } else {
            DbBackend::Sqlite
        }
    }

    /// Open a new handle. The caller owns it and must close it.
    pub async fn acquire(&self) -> Result<DatabaseConnection, AccessError> {
        let mut opt = ConnectOptions::new(self.url.clone());
        opt.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .map_err(|source| AccessError::Connect {
                database: self.name.clone(),
                source,
            })?;

        debug!(database = %self.name, "Opened database handle");
        Ok(conn)
    }

    /// Run `op` with a fresh handle and release the handle afterwards,
    /// whether `op` succeeded or failed.
    ///
    /// A panic or cancellation drops the handle, which also closes it.
    pub async fn with_connection<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(DatabaseConnection) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AccessError>,
    {
        let conn = self.acquire().await?;
        let result = op(conn.clone()).await;

        if let Err(e) = conn.close().await {
            warn!(database = %self.name, error = %e, "Failed to close database handle");
        } else {
            debug!(database = %self.name, "Closed database handle");
        }

        result
    }
}
