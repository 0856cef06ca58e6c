//! [`UserService`] backed by the guarded access chain.
//!
//! Each operation picks the wrappers it needs:
//! - listing: cache, then connection, then retry
//! - summary: two connections queried concurrently
//! - lookup: connection only
//! - writes: connection, then retry, then transaction

use sea_orm::{DbBackend, Statement};
use std::sync::Arc;
use tracing::info;

use crate::access::{AccessChain, AccessError, Row, fetch_pair, fetch_rows};
use crate::db::UserRepository;
use crate::db::repositories::user::NewUser;
use crate::gate::Role;
use crate::services::user_service::{
    CreateUserRequest, CreatedUser, UserError, UserService, UserSummary, is_valid_email,
};

/// Columns exposed by user listings. The API key is never selected.
const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, phone_number, age, role, created_at";

pub struct AccessChainUserService {
    chain: AccessChain,
}

impl AccessChainUserService {
    #[must_use]
    pub const fn new(chain: AccessChain) -> Self {
        Self { chain }
    }

    fn backend(&self) -> DbBackend {
        self.chain.provider().backend()
    }

    fn all_users(&self) -> Statement {
        Statement::from_string(
            self.backend(),
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"),
        )
    }
}

#[async_trait::async_trait]
impl UserService for AccessChainUserService {
    async fn list_users(&self) -> Result<Arc<Vec<Row>>, UserError> {
        Ok(self.chain.fetch(self.all_users()).await?)
    }

    async fn summary(&self, min_age: i32) -> Result<UserSummary, UserError> {
        let older = Statement::from_sql_and_values(
            self.backend(),
            format!("SELECT {USER_COLUMNS} FROM users WHERE age > ? ORDER BY username"),
            [min_age.into()],
        );

        let (users, older_users) = fetch_pair(self.chain.provider(), self.all_users(), older).await?;

        Ok(UserSummary {
            min_age,
            total: users.len(),
            older_count: older_users.len(),
            users,
            older_users,
        })
    }

    async fn get_user(&self, id: &str) -> Result<Row, UserError> {
        let stmt = Statement::from_sql_and_values(
            self.backend(),
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
            [id.into()],
        );

        let rows = self
            .chain
            .provider()
            .with_connection(|conn| async move {
                fetch_rows(&conn, stmt).await.map_err(AccessError::from)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| UserError::NotFound(format!("User {id}")))
    }

    async fn update_email(&self, id: &str, email: &str) -> Result<(), UserError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(UserError::Validation(format!("Invalid email: {email}")));
        }

        let updated = self
            .chain
            .run_in_transaction(|txn| {
                let id = id.to_string();
                let email = email.to_string();
                Box::pin(async move {
                    let updated = UserRepository::new(txn).update_email(&id, &email).await?;
                    Ok::<_, UserError>(updated)
                })
            })
            .await?;

        if !updated {
            return Err(UserError::NotFound(format!("User {id}")));
        }

        info!(user_id = %id, "Email updated");
        Ok(())
    }

    async fn create_user(&self, request: CreateUserRequest) -> Result<CreatedUser, UserError> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(UserError::Validation("Username is required".to_string()));
        }
        let email = request.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(UserError::Validation(format!("Invalid email: {email}")));
        }
        if let Some(age) = request.age
            && age < 0
        {
            return Err(UserError::Validation("Age cannot be negative".to_string()));
        }
        let role = match request.role.as_deref() {
            Some(raw) => raw.parse::<Role>().map_err(UserError::Validation)?,
            None => Role::Guest,
        };

        let new_user = NewUser {
            username,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email,
            phone_number: request.phone_number,
            age: request.age,
            role: role.to_string(),
        };

        let user = self
            .chain
            .run_in_transaction(|txn| {
                let new_user = new_user.clone();
                Box::pin(async move {
                    let user = UserRepository::new(txn).create(new_user).await?;
                    Ok::<_, UserError>(user)
                })
            })
            .await?;

        info!(username = %user.username, role = %user.role, "User created");
        let api_key = user.api_key.clone();
        Ok(CreatedUser { user, api_key })
    }

    async fn query(&self, sql: &str) -> Result<Arc<Vec<Row>>, UserError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(UserError::Validation("Query is empty".to_string()));
        }

        let stmt = Statement::from_string(self.backend(), sql.to_string());
        Ok(self.chain.fetch(stmt).await?)
    }
}
