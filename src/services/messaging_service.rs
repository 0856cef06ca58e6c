//! Domain service for conversations, messages and notifications.
//!
//! This module provides the [`MessagingService`] trait and the view types it
//! returns. Every operation acts on behalf of an authenticated user.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::preview;
use crate::entities::{message_history, messages, notifications, users};

/// Domain errors for messaging operations.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for MessagingError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl MessagingError {
    pub fn message_not_found(id: &str) -> Self {
        Self::NotFound(format!("Message {id}"))
    }

    pub fn conversation_not_found(id: &str) -> Self {
        Self::NotFound(format!("Conversation {id}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantView {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<users::Model> for ParticipantView {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: Option<String>,
    pub parent_message_id: Option<String>,
    pub body: String,
    pub preview: String,
    pub sent_at: String,
    pub edited: bool,
    pub edited_at: Option<String>,
    pub edited_by: Option<String>,
}

impl MessageView {
    #[must_use]
    pub fn from_model(message: messages::Model, sender_username: Option<String>) -> Self {
        Self {
            preview: preview(&message.body),
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_username,
            parent_message_id: message.parent_message_id,
            body: message.body,
            sent_at: message.sent_at,
            edited: message.edited,
            edited_at: message.edited_at,
            edited_by: message.edited_by,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: String,
    pub participants: Vec<ParticipantView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationSummary,
    pub messages: Vec<MessageView>,
}

/// A message with its replies, recursively.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub message: MessageView,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Number of messages in this subtree, including the root.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(Self::size).sum::<usize>()
    }
}

/// Slim projection used by the unread inbox.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadMessage {
    pub id: String,
    pub sender_username: Option<String>,
    pub body: String,
    pub sent_at: String,
}

pub type HistoryEntry = message_history::Model;

pub type NotificationView = notifications::Model;

/// Query-string filters for message listings. `page` is 1-based.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    pub conversation_id: Option<String>,
    /// Sender user id.
    pub sender: Option<String>,
    pub sent_after: Option<String>,
    pub sent_before: Option<String>,
    pub page: u64,
    pub page_size: u64,
}

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            conversation_id: None,
            sender: None,
            sent_after: None,
            sent_before: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[async_trait::async_trait]
pub trait MessagingService: Send + Sync {
    /// Start a conversation between `creator` and `participant_ids`.
    ///
    /// # Errors
    ///
    /// - [`MessagingError::Validation`] when no other participant is given
    ///   or one of them does not exist
    async fn create_conversation(
        &self,
        creator: &users::Model,
        participant_ids: Vec<String>,
    ) -> Result<ConversationDetail, MessagingError>;

    async fn list_conversations(
        &self,
        user: &users::Model,
    ) -> Result<Vec<ConversationSummary>, MessagingError>;

    /// # Errors
    ///
    /// - [`MessagingError::NotFound`] if the conversation does not exist
    /// - [`MessagingError::Forbidden`] if `user` is not a participant
    async fn get_conversation(
        &self,
        user: &users::Model,
        conversation_id: &str,
    ) -> Result<ConversationDetail, MessagingError>;

    /// Post a message, optionally as a reply to `parent_id`.
    ///
    /// # Errors
    ///
    /// - [`MessagingError::Validation`] for an empty body or a parent from
    ///   another conversation
    /// - [`MessagingError::Forbidden`] if `sender` is not a participant
    async fn send_message(
        &self,
        sender: &users::Model,
        conversation_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<MessageView, MessagingError>;

    async fn list_messages(
        &self,
        user: &users::Model,
        filter: MessageFilter,
    ) -> Result<Page<MessageView>, MessagingError>;

    async fn get_message(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<MessageView, MessagingError>;

    async fn thread(&self, user: &users::Model, message_id: &str)
    -> Result<ThreadNode, MessagingError>;

    /// Replace the body of a message. Only its sender may edit it.
    async fn edit_message(
        &self,
        editor: &users::Model,
        message_id: &str,
        new_body: &str,
    ) -> Result<MessageView, MessagingError>;

    async fn message_history(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<Vec<HistoryEntry>, MessagingError>;

    async fn delete_message(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<(), MessagingError>;

    /// Messages in the user's conversations, sent by someone else, that
    /// the user has not marked read yet.
    async fn unread_for_user(
        &self,
        user: &users::Model,
    ) -> Result<Vec<UnreadMessage>, MessagingError>;

    /// Mark a message read for `user` only, along with the user's
    /// notifications about it.
    ///
    /// # Errors
    ///
    /// - [`MessagingError::Validation`] when `user` sent the message
    /// - [`MessagingError::Forbidden`] when `user` is not a participant
    async fn mark_as_read(&self, user: &users::Model, message_id: &str)
    -> Result<(), MessagingError>;

    async fn notifications(
        &self,
        user: &users::Model,
        unread_only: bool,
    ) -> Result<Vec<NotificationView>, MessagingError>;

    async fn mark_notification_read(
        &self,
        user: &users::Model,
        notification_id: i32,
    ) -> Result<(), MessagingError>;

    /// Remove the account of `user` and everything it owns.
    async fn delete_account(&self, user: &users::Model) -> Result<(), MessagingError>;
}
