//! Guarded database access.
//!
//! Small composable wrappers around a unit of database work:
//!
//! - [`ConnectionProvider`] opens a dedicated handle and always releases it.
//! - [`RetryPolicy`] re-runs a failing operation a bounded number of times.
//! - [`transactional`] commits on success and rolls back on error.
//! - [`QueryCache`] memoizes materialized rows per statement.
//! - [`AccessChain`] stacks the above with the connection outermost.
//! - [`fetch_pair`] runs two read-only statements concurrently.

pub mod cache;
pub mod chain;
pub mod concurrent;
pub mod connection;
pub mod retry;
pub mod transaction;

pub use cache::{CacheKey, CacheStats, QueryCache};
pub use chain::AccessChain;
pub use concurrent::fetch_pair;
pub use connection::ConnectionProvider;
pub use retry::RetryPolicy;
pub use transaction::transactional;

use sea_orm::{ConnectionTrait, DbErr, FromQueryResult, JsonValue, Statement};
use thiserror::Error;

/// A materialized result row, one JSON object per row.
pub type Row = JsonValue;

/// Errors raised by the access layer itself.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Failed to connect to database '{database}': {source}")]
    Connect {
        database: String,
        #[source]
        source: DbErr,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Run a raw statement and materialize every row as JSON.
pub async fn fetch_rows<C>(conn: &C, stmt: Statement) -> Result<Vec<Row>, DbErr>
where
    C: ConnectionTrait,
{
    JsonValue::find_by_statement(stmt).all(conn).await
}
