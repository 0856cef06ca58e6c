use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::users;

/// Fields supplied when registering a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub age: Option<i32>,
    pub role: String,
}

pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C> UserRepository<'a, C>
where
    C: ConnectionTrait,
{
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(self.db).await
    }

    pub async fn get_by_api_key(&self, api_key: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::ApiKey.eq(api_key))
            .one(self.db)
            .await
    }

    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<users::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        users::Entity::find()
            .filter(users::Column::Id.is_in(ids.iter().cloned()))
            .order_by_asc(users::Column::Username)
            .all(self.db)
            .await
    }

    pub async fn count(&self) -> Result<u64, DbErr> {
        users::Entity::find().count(self.db).await
    }

    /// Insert a user with a fresh id and API key.
    pub async fn create(&self, user: NewUser) -> Result<users::Model, DbErr> {
        let model = users::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            username: Set(user.username),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            email: Set(user.email),
            phone_number: Set(user.phone_number),
            age: Set(user.age),
            role: Set(user.role),
            api_key: Set(generate_api_key()),
            created_at: Set(crate::db::timestamp_now()),
        };

        model.insert(self.db).await
    }

    pub async fn update_email(&self, id: &str, email: &str) -> Result<bool, DbErr> {
        let Some(user) = self.get(id).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        active.email = Set(email.to_string());
        active.update(self.db).await?;

        Ok(true)
    }

    pub async fn regenerate_api_key(&self, id: &str) -> Result<Option<String>, DbErr> {
        let Some(user) = self.get(id).await? else {
            return Ok(None);
        };

        let new_key = generate_api_key();
        let mut active: users::ActiveModel = user.into();
        active.api_key = Set(new_key.clone());
        active.update(self.db).await?;

        Ok(Some(new_key))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DbErr> {
        let result = users::Entity::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }
}

/// Generate a random 64-character hex API key.
#[must_use]
pub fn generate_api_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key());
    }
}
