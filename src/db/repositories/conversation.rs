use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{conversation_participants, conversations};

pub struct ConversationRepository<'a, C> {
    db: &'a C,
}

impl<'a, C> ConversationRepository<'a, C>
where
    C: ConnectionTrait,
{
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create a conversation with the given members.
    ///
    /// Duplicate ids in `participant_ids` are inserted once.
    pub async fn create(&self, participant_ids: &[String]) -> Result<conversations::Model, DbErr> {
        let now = crate::db::timestamp_now();
        let conversation = conversations::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            created_at: Set(now.clone()),
        }
        .insert(self.db)
        .await?;

        let mut seen = std::collections::HashSet::new();
        let members: Vec<conversation_participants::ActiveModel> = participant_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|user_id| conversation_participants::ActiveModel {
                conversation_id: Set(conversation.id.clone()),
                user_id: Set(user_id.clone()),
                joined_at: Set(now.clone()),
            })
            .collect();

        if !members.is_empty() {
            conversation_participants::Entity::insert_many(members)
                .exec_without_returning(self.db)
                .await?;
        }

        Ok(conversation)
    }

    pub async fn get(&self, id: &str) -> Result<Option<conversations::Model>, DbErr> {
        conversations::Entity::find_by_id(id).one(self.db).await
    }

    /// Conversations the user takes part in, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<conversations::Model>, DbErr> {
        let ids = self.ids_for_user(user_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        conversations::Entity::find()
            .filter(conversations::Column::Id.is_in(ids))
            .order_by_desc(conversations::Column::CreatedAt)
            .all(self.db)
            .await
    }

    pub async fn ids_for_user(&self, user_id: &str) -> Result<Vec<String>, DbErr> {
        conversation_participants::Entity::find()
            .select_only()
            .column(conversation_participants::Column::ConversationId)
            .filter(conversation_participants::Column::UserId.eq(user_id))
            .into_tuple()
            .all(self.db)
            .await
    }

    pub async fn participant_ids(&self, conversation_id: &str) -> Result<Vec<String>, DbErr> {
        conversation_participants::Entity::find()
            .select_only()
            .column(conversation_participants::Column::UserId)
            .filter(conversation_participants::Column::ConversationId.eq(conversation_id))
            .order_by_asc(conversation_participants::Column::JoinedAt)
            .into_tuple()
            .all(self.db)
            .await
    }

    pub async fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool, DbErr> {
        let count = conversation_participants::Entity::find()
            .filter(conversation_participants::Column::ConversationId.eq(conversation_id))
            .filter(conversation_participants::Column::UserId.eq(user_id))
            .count(self.db)
            .await?;

        Ok(count > 0)
    }

    pub async fn remove_participant_everywhere(&self, user_id: &str) -> Result<u64, DbErr> {
        let result = conversation_participants::Entity::delete_many()
            .filter(conversation_participants::Column::UserId.eq(user_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
