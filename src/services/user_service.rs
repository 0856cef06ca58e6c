//! Domain service for user records.
//!
//! Every operation goes through the guarded access chain rather than the
//! shared pool, so each one runs over its own connection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::access::{AccessError, Row};
use crate::entities::users;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Access(#[from] AccessError),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
            _ => Self::Access(AccessError::Database(err)),
        }
    }
}

/// Result of the concurrent user summary.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub min_age: i32,
    pub total: usize,
    pub older_count: usize,
    pub users: Vec<Row>,
    pub older_users: Vec<Row>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub role: Option<String>,
}

/// A freshly registered user together with its API key.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    #[serde(flatten)]
    pub user: users::Model,
    pub api_key: String,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// All users, served from the query cache after the first call.
    async fn list_users(&self) -> Result<Arc<Vec<Row>>, UserError>;

    /// All users and users older than `min_age`, fetched concurrently.
    async fn summary(&self, min_age: i32) -> Result<UserSummary, UserError>;

    async fn get_user(&self, id: &str) -> Result<Row, UserError>;

    /// Change a user's email inside a retried transaction.
    ///
    /// # Errors
    ///
    /// - [`UserError::Validation`] for a malformed address
    /// - [`UserError::NotFound`] if the user does not exist
    /// - [`UserError::Conflict`] if the address is already taken
    async fn update_email(&self, id: &str, email: &str) -> Result<(), UserError>;

    async fn create_user(&self, request: CreateUserRequest) -> Result<CreatedUser, UserError>;

    /// Run a raw read statement through the cache and retry wrappers.
    async fn query(&self, sql: &str) -> Result<Arc<Vec<Row>>, UserError>;
}

/// Minimal shape check: one `@` with text on both sides and no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice@localhost"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }
}
