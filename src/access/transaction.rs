use futures::future::BoxFuture;
use sea_orm::{DatabaseTransaction, DbErr, TransactionTrait};
use std::fmt;
use tracing::{error, warn};

/// Run `op` inside a transaction on `conn`.
///
/// Commits when `op` returns `Ok`. On `Err` the transaction is rolled back,
/// the failure is logged and the original error is returned. No savepoints.
pub async fn transactional<C, T, E, F>(conn: &C, op: F) -> Result<T, E>
where
    C: TransactionTrait,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>>,
    E: From<DbErr> + fmt::Display,
{
    let txn = conn.begin().await?;

    match op(&txn).await {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "Transaction failed, rolling back");
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{
        ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement,
    };

    async fn memory_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let conn = Database::connect(opt).await.unwrap();
        conn.execute(Statement::from_string(
            DbBackend::Sqlite,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)".to_string(),
        ))
        .await
        .unwrap();
        conn
    }

    async fn count_users(conn: &DatabaseConnection) -> i64 {
        let row = conn
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM users".to_string(),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let conn = memory_db().await;

        let inserted: Result<u64, DbErr> = transactional(&conn, |txn| {
            Box::pin(async move {
                let res = txn
                    .execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "INSERT INTO users (email) VALUES ('a@example.com')".to_string(),
                    ))
                    .await?;
                Ok(res.rows_affected())
            })
        })
        .await;

        assert_eq!(inserted.unwrap(), 1);
        assert_eq!(count_users(&conn).await, 1);
    }

    #[tokio::test]
    async fn test_rollback_on_error_leaves_no_change() {
        let conn = memory_db().await;

        let result: Result<(), DbErr> = transactional(&conn, |txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO users (email) VALUES ('b@example.com')".to_string(),
                ))
                .await?;
                Err(DbErr::Custom("boom halfway through".to_string()))
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(count_users(&conn).await, 0);
    }
}
