use sea_orm::Statement;
use tracing::debug;

use super::{AccessError, ConnectionProvider, Row, fetch_rows};

/// Run two read-only statements concurrently, each over its own handle.
///
/// Both must succeed; the first failure aborts the join and is returned.
/// Results come back in argument order regardless of which finished first.
pub async fn fetch_pair(
    provider: &ConnectionProvider,
    first: Statement,
    second: Statement,
) -> Result<(Vec<Row>, Vec<Row>), AccessError> {
    debug!(database = provider.name(), "Running paired queries concurrently");

    let first = provider.with_connection(|conn| async move {
        fetch_rows(&conn, first).await.map_err(AccessError::from)
    });
    let second = provider.with_connection(|conn| async move {
        fetch_rows(&conn, second).await.map_err(AccessError::from)
    });

    tokio::try_join!(first, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DbBackend};

    async fn seeded_provider() -> (std::path::PathBuf, ConnectionProvider) {
        let path = std::env::temp_dir().join(format!("missive-pair-{}.db", uuid::Uuid::new_v4()));
        std::fs::File::create(&path).unwrap();
        let provider = ConnectionProvider::new("users", format!("sqlite:{}", path.display()));

        provider
            .with_connection(|conn| async move {
                conn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)".to_string(),
                ))
                .await?;
                conn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO users (name, age) VALUES ('ana', 22), ('ben', 41), ('cy', 67)"
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
    async fn test_both_results_match_their_queries() {
        let (path, provider) = seeded_provider().await;

        let (all, older) = fetch_pair(
            &provider,
            Statement::from_string(DbBackend::Sqlite, "SELECT * FROM users".to_string()),
            Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "SELECT * FROM users WHERE age > ?",
                [40.into()],
            ),
        )
        .await
        .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(older.len(), 2);
        assert!(older.iter().all(|row| row["age"].as_i64().unwrap() > 40));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_failure_in_either_query_aborts_the_join() {
        let (path, provider) = seeded_provider().await;

        let result = fetch_pair(
            &provider,
            Statement::from_string(DbBackend::Sqlite, "SELECT * FROM users".to_string()),
            Statement::from_string(DbBackend::Sqlite, "SELECT * FROM nowhere".to_string()),
        )
        .await;

        assert!(matches!(result, Err(AccessError::Database(_))));
        let _ = std::fs::remove_file(path);
    }
}
