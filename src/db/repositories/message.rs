use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{message_history, message_reads, messages};

/// Filters applied when listing messages.
///
/// `conversation_ids` restricts the result to conversations the caller is
/// allowed to see; the remaining fields narrow it further.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub conversation_ids: Vec<String>,
    pub conversation_id: Option<String>,
    pub sender_id: Option<String>,
    pub sent_after: Option<String>,
    pub sent_before: Option<String>,
}

pub struct MessageRepository<'a, C> {
    db: &'a C,
}

impl<'a, C> MessageRepository<'a, C>
where
    C: ConnectionTrait,
{
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        parent_message_id: Option<&str>,
    ) -> Result<messages::Model, DbErr> {
        messages::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            conversation_id: Set(conversation_id.to_string()),
            sender_id: Set(sender_id.to_string()),
            parent_message_id: Set(parent_message_id.map(str::to_string)),
            body: Set(body.to_string()),
            sent_at: Set(crate::db::timestamp_now()),
            edited: Set(false),
            edited_at: Set(None),
            edited_by: Set(None),
        }
        .insert(self.db)
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<messages::Model>, DbErr> {
        messages::Entity::find_by_id(id).one(self.db).await
    }

    /// All messages of a conversation, oldest first.
    pub async fn list_in_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<messages::Model>, DbErr> {
        messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_asc(messages::Column::SentAt)
            .all(self.db)
            .await
    }

    /// One page of matching messages, newest first, plus the total count.
    ///
    /// `page` is 1-based.
    pub async fn search(
        &self,
        query: &MessageQuery,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<messages::Model>, u64), DbErr> {
        let mut condition =
            Condition::all().add(messages::Column::ConversationId.is_in(query.conversation_ids.clone()));

        if let Some(conversation_id) = &query.conversation_id {
            condition = condition.add(messages::Column::ConversationId.eq(conversation_id.as_str()));
        }
        if let Some(sender_id) = &query.sender_id {
            condition = condition.add(messages::Column::SenderId.eq(sender_id.as_str()));
        }
        if let Some(after) = &query.sent_after {
            condition = condition.add(messages::Column::SentAt.gte(after.as_str()));
        }
        if let Some(before) = &query.sent_before {
            condition = condition.add(messages::Column::SentAt.lte(before.as_str()));
        }

        let paginator = messages::Entity::find()
            .filter(condition)
            .order_by_desc(messages::Column::SentAt)
            .paginate(self.db, page_size.max(1));

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    /// Direct replies to any of `parent_ids`, oldest first.
    pub async fn replies_to(&self, parent_ids: &[String]) -> Result<Vec<messages::Model>, DbErr> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        messages::Entity::find()
            .filter(messages::Column::ParentMessageId.is_in(parent_ids.iter().cloned()))
            .order_by_asc(messages::Column::SentAt)
            .all(self.db)
            .await
    }

    /// Messages in `conversation_ids` that `user_id` neither sent nor read,
    /// newest first.
    pub async fn unread_for(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> Result<Vec<messages::Model>, DbErr> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let read_by_user = Query::select()
            .column(message_reads::Column::MessageId)
            .from(message_reads::Entity)
            .and_where(message_reads::Column::UserId.eq(user_id))
            .to_owned();

        messages::Entity::find()
            .filter(messages::Column::ConversationId.is_in(conversation_ids.iter().cloned()))
            .filter(messages::Column::SenderId.ne(user_id))
            .filter(messages::Column::Id.not_in_subquery(read_by_user))
            .order_by_desc(messages::Column::SentAt)
            .all(self.db)
            .await
    }

    pub async fn update_body(
        &self,
        message: messages::Model,
        new_body: &str,
        editor_id: &str,
    ) -> Result<messages::Model, DbErr> {
        let mut active: messages::ActiveModel = message.into();
        active.body = Set(new_body.to_string());
        active.edited = Set(true);
        active.edited_at = Set(Some(crate::db::timestamp_now()));
        active.edited_by = Set(Some(editor_id.to_string()));
        active.update(self.db).await
    }

    /// Record that `user_id` has read message `id`.
    ///
    /// Returns `false` when it was already marked.
    pub async fn mark_read(&self, id: &str, user_id: &str) -> Result<bool, DbErr> {
        let read = message_reads::ActiveModel {
            message_id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            read_at: Set(crate::db::timestamp_now()),
        };

        let inserted = message_reads::Entity::insert(read)
            .on_conflict(
                OnConflict::columns([
                    message_reads::Column::MessageId,
                    message_reads::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;

        Ok(inserted > 0)
    }

    pub async fn delete_reads_by_user(&self, user_id: &str) -> Result<u64, DbErr> {
        let result = message_reads::Entity::delete_many()
            .filter(message_reads::Column::UserId.eq(user_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DbErr> {
        let result = messages::Entity::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn delete_by_sender(&self, sender_id: &str) -> Result<u64, DbErr> {
        let result = messages::Entity::delete_many()
            .filter(messages::Column::SenderId.eq(sender_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Clear the editor reference left behind by a removed user.
    pub async fn clear_editor(&self, editor_id: &str) -> Result<u64, DbErr> {
        let result = messages::Entity::update_many()
            .col_expr(messages::Column::EditedBy, Expr::value(Option::<String>::None))
            .filter(messages::Column::EditedBy.eq(editor_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn record_history(
        &self,
        message_id: &str,
        old_body: &str,
        edited_by: Option<&str>,
    ) -> Result<message_history::Model, DbErr> {
        message_history::ActiveModel {
            message_id: Set(message_id.to_string()),
            old_body: Set(old_body.to_string()),
            edited_at: Set(crate::db::timestamp_now()),
            edited_by: Set(edited_by.map(str::to_string)),
            ..Default::default()
        }
        .insert(self.db)
        .await
    }

    /// Previous bodies of a message, newest first.
    pub async fn history(&self, message_id: &str) -> Result<Vec<message_history::Model>, DbErr> {
        message_history::Entity::find()
            .filter(message_history::Column::MessageId.eq(message_id))
            .order_by_desc(message_history::Column::Id)
            .all(self.db)
            .await
    }
}
