//! Side effects attached to messaging writes.
//!
//! Each observer runs inside the transaction of the write that produced the
//! event, so a failing observer rolls the whole write back.

use sea_orm::{DatabaseTransaction, DbErr};
use std::sync::Arc;
use tracing::debug;

use super::events::MessagingEvent;
use crate::db::{ConversationRepository, MessageRepository, NotificationRepository};

#[async_trait::async_trait]
pub trait MessagingObserver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, txn: &DatabaseTransaction, event: &MessagingEvent) -> Result<(), DbErr>;
}

/// Ordered list of observers notified for every event.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn MessagingObserver>>,
}

impl ObserverList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notification, history and cleanup observers.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with(Arc::new(NotificationObserver))
            .with(Arc::new(HistoryObserver))
            .with(Arc::new(CleanupObserver))
    }

    #[must_use]
    pub fn with(mut self, observer: Arc<dyn MessagingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub async fn dispatch(&self, txn: &DatabaseTransaction, event: &MessagingEvent) -> Result<(), DbErr> {
        for observer in &self.observers {
            debug!(observer = observer.name(), event = event.name(), "Dispatching event");
            observer.on_event(txn, event).await?;
        }
        Ok(())
    }
}

/// Creates a notification for every recipient of a new message.
pub struct NotificationObserver;

#[async_trait::async_trait]
impl MessagingObserver for NotificationObserver {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn on_event(&self, txn: &DatabaseTransaction, event: &MessagingEvent) -> Result<(), DbErr> {
        let MessagingEvent::MessageCreated {
            message_id,
            sender_username,
            recipient_ids,
            ..
        } = event
        else {
            return Ok(());
        };

        let repo = NotificationRepository::new(txn);
        let text = format!("New message from {sender_username}");
        for recipient in recipient_ids {
            repo.create(recipient, message_id, &text).await?;
        }

        Ok(())
    }
}

/// Keeps the previous body of an edited message.
pub struct HistoryObserver;

#[async_trait::async_trait]
impl MessagingObserver for HistoryObserver {
    fn name(&self) -> &'static str {
        "history"
    }

    async fn on_event(&self, txn: &DatabaseTransaction, event: &MessagingEvent) -> Result<(), DbErr> {
        let MessagingEvent::MessageEdited {
            message_id,
            edited_by,
            previous_body,
            ..
        } = event
        else {
            return Ok(());
        };

        MessageRepository::new(txn)
            .record_history(message_id, previous_body, Some(edited_by))
            .await?;

        Ok(())
    }
}

/// Removes what a deleted user leaves behind.
///
/// Foreign-key cascades already cover most rows; this keeps the cleanup
/// explicit and is a no-op when they have run.
pub struct CleanupObserver;

#[async_trait::async_trait]
impl MessagingObserver for CleanupObserver {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn on_event(&self, txn: &DatabaseTransaction, event: &MessagingEvent) -> Result<(), DbErr> {
        let MessagingEvent::UserDeleted { user_id, username } = event else {
            return Ok(());
        };

        let messages = MessageRepository::new(txn);
        let removed_messages = messages.delete_by_sender(user_id).await?;
        messages.clear_editor(user_id).await?;
        messages.delete_reads_by_user(user_id).await?;
        let removed_notifications = NotificationRepository::new(txn)
            .delete_for_user(user_id)
            .await?;
        ConversationRepository::new(txn)
            .remove_participant_everywhere(user_id)
            .await?;

        debug!(
            user = %username,
            removed_messages,
            removed_notifications,
            "Cleaned up data of deleted user"
        );

        Ok(())
    }
}
