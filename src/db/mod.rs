use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::conversation::ConversationRepository;
pub use repositories::message::{MessageQuery, MessageRepository};
pub use repositories::notification::NotificationRepository;
pub use repositories::user::{UserRepository, generate_api_key};

use crate::entities::users;

/// Current UTC time with fixed microsecond precision.
///
/// Stored timestamps sort lexicographically in chronological order.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub const fn users(&self) -> UserRepository<'_, DatabaseConnection> {
        UserRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn conversations(&self) -> ConversationRepository<'_, DatabaseConnection> {
        ConversationRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn messages(&self) -> MessageRepository<'_, DatabaseConnection> {
        MessageRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn notifications(&self) -> NotificationRepository<'_, DatabaseConnection> {
        NotificationRepository::new(&self.conn)
    }

    pub async fn verify_api_key(&self, api_key: &str) -> Result<Option<users::Model>> {
        Ok(self.users().get_by_api_key(api_key).await?)
    }
}
