use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::entities::notifications;

pub struct NotificationRepository<'a, C> {
    db: &'a C,
}

impl<'a, C> NotificationRepository<'a, C>
where
    C: ConnectionTrait,
{
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<notifications::Model, DbErr> {
        notifications::ActiveModel {
            user_id: Set(user_id.to_string()),
            message_id: Set(message_id.to_string()),
            text: Set(text.to_string()),
            is_read: Set(false),
            created_at: Set(crate::db::timestamp_now()),
            ..Default::default()
        }
        .insert(self.db)
        .await
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<notifications::Model>, DbErr> {
        let mut query = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notifications::Column::IsRead.eq(false));
        }

        query
            .order_by_desc(notifications::Column::Id)
            .all(self.db)
            .await
    }

    /// Mark one of the user's notifications as read.
    ///
    /// Returns `false` when no such notification belongs to the user.
    pub async fn mark_read(&self, user_id: &str, id: i32) -> Result<bool, DbErr> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Mark the user's notifications about `message_id` as read.
    pub async fn mark_read_for_message(&self, user_id: &str, message_id: &str) -> Result<u64, DbErr> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::MessageId.eq(message_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn delete_for_user(&self, user_id: &str) -> Result<u64, DbErr> {
        let result = notifications::Entity::delete_many()
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
