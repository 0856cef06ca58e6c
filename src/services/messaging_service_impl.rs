//! `SeaORM` implementation of the [`MessagingService`] trait.
//!
//! Writes that have side effects run inside a transaction together with the
//! observers for the event they produce. Events are broadcast only after the
//! transaction commits.

use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::DbErr;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::access::transactional;
use crate::db::{
    ConversationRepository, MessageQuery, MessageRepository, NotificationRepository, Store,
    UserRepository,
};
use crate::domain::{MessagingEvent, ObserverList};
use crate::entities::{conversations, messages, users};
use crate::services::messaging_service::{
    ConversationDetail, ConversationSummary, HistoryEntry, MAX_PAGE_SIZE, MessageFilter,
    MessageView, MessagingError, MessagingService, NotificationView, Page, ParticipantView,
    ThreadNode, UnreadMessage,
};

pub struct SeaOrmMessagingService {
    store: Arc<Store>,
    observers: ObserverList,
    event_bus: broadcast::Sender<MessagingEvent>,
}

impl SeaOrmMessagingService {
    #[must_use]
    pub const fn new(
        store: Arc<Store>,
        observers: ObserverList,
        event_bus: broadcast::Sender<MessagingEvent>,
    ) -> Self {
        Self {
            store,
            observers,
            event_bus,
        }
    }

    fn publish(&self, event: MessagingEvent) {
        let name = event.name();
        // Err only means nobody is subscribed right now.
        if self.event_bus.send(event).is_err() {
            debug!(event = name, "No event subscribers");
        }
    }

    async fn usernames(&self, ids: &[String]) -> Result<HashMap<String, String>, DbErr> {
        let users = self.store.users().get_many(ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
    }

    async fn require_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), MessagingError> {
        if self
            .store
            .conversations()
            .is_participant(conversation_id, user_id)
            .await?
        {
            Ok(())
        } else {
            Err(MessagingError::Forbidden(
                "You are not a participant of this conversation".to_string(),
            ))
        }
    }

    /// Load a message the user is allowed to see.
    async fn visible_message(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<messages::Model, MessagingError> {
        let message = self
            .store
            .messages()
            .get(message_id)
            .await?
            .ok_or_else(|| MessagingError::message_not_found(message_id))?;

        self.require_participant(&message.conversation_id, &user.id)
            .await?;
        Ok(message)
    }

    async fn views(&self, messages: Vec<messages::Model>) -> Result<Vec<MessageView>, MessagingError> {
        let sender_ids: Vec<String> = messages
            .iter()
            .map(|m| m.sender_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let names = self.usernames(&sender_ids).await?;

        Ok(messages
            .into_iter()
            .map(|m| {
                let username = names.get(&m.sender_id).cloned();
                MessageView::from_model(m, username)
            })
            .collect())
    }

    async fn summary(
        &self,
        conversation: conversations::Model,
    ) -> Result<ConversationSummary, MessagingError> {
        let participant_ids = self
            .store
            .conversations()
            .participant_ids(&conversation.id)
            .await?;
        let participants = self
            .store
            .users()
            .get_many(&participant_ids)
            .await?
            .into_iter()
            .map(ParticipantView::from)
            .collect();

        Ok(ConversationSummary {
            id: conversation.id,
            created_at: conversation.created_at,
            participants,
        })
    }

    async fn detail(
        &self,
        conversation: conversations::Model,
    ) -> Result<ConversationDetail, MessagingError> {
        let messages = self
            .store
            .messages()
            .list_in_conversation(&conversation.id)
            .await?;
        let messages = self.views(messages).await?;

        Ok(ConversationDetail {
            conversation: self.summary(conversation).await?,
            messages,
        })
    }
}

/// Normalize a client-supplied instant to the stored timestamp format.
fn normalize_instant(field: &str, value: Option<String>) -> Result<Option<String>, MessagingError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| {
                    dt.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Micros, true)
                })
                .map_err(|e| MessagingError::Validation(format!("Invalid {field}: {e}")))
        })
        .transpose()
}

fn build_thread(view: MessageView, children: &mut HashMap<String, Vec<MessageView>>) -> ThreadNode {
    let replies = children
        .remove(&view.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| build_thread(child, children))
        .collect();

    ThreadNode {
        message: view,
        replies,
    }
}

#[async_trait::async_trait]
impl MessagingService for SeaOrmMessagingService {
    async fn create_conversation(
        &self,
        creator: &users::Model,
        participant_ids: Vec<String>,
    ) -> Result<ConversationDetail, MessagingError> {
        let mut others: Vec<String> = participant_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && *id != creator.id)
            .collect();
        others.sort();
        others.dedup();

        if others.is_empty() {
            return Err(MessagingError::Validation(
                "At least one other participant is required".to_string(),
            ));
        }

        let found: HashSet<String> = self
            .store
            .users()
            .get_many(&others)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        let unknown: Vec<&str> = others
            .iter()
            .filter(|id| !found.contains(*id))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(MessagingError::Validation(format!(
                "Unknown participants: {}",
                unknown.join(", ")
            )));
        }

        let mut members = Vec::with_capacity(others.len() + 1);
        members.push(creator.id.clone());
        members.extend(others);

        let conversation = transactional(&self.store.conn, move |txn| {
            Box::pin(async move {
                let conversation = ConversationRepository::new(txn).create(&members).await?;
                Ok::<_, MessagingError>(conversation)
            })
        })
        .await?;

        info!(conversation_id = %conversation.id, creator = %creator.username, "Conversation created");
        self.detail(conversation).await
    }

    async fn list_conversations(
        &self,
        user: &users::Model,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        let conversations = self.store.conversations().list_for_user(&user.id).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            summaries.push(self.summary(conversation).await?);
        }
        Ok(summaries)
    }

    async fn get_conversation(
        &self,
        user: &users::Model,
        conversation_id: &str,
    ) -> Result<ConversationDetail, MessagingError> {
        let conversation = self
            .store
            .conversations()
            .get(conversation_id)
            .await?
            .ok_or_else(|| MessagingError::conversation_not_found(conversation_id))?;

        self.require_participant(conversation_id, &user.id).await?;
        self.detail(conversation).await
    }

    async fn send_message(
        &self,
        sender: &users::Model,
        conversation_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<MessageView, MessagingError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(MessagingError::Validation(
                "Message body is required".to_string(),
            ));
        }

        if self
            .store
            .conversations()
            .get(conversation_id)
            .await?
            .is_none()
        {
            return Err(MessagingError::conversation_not_found(conversation_id));
        }
        self.require_participant(conversation_id, &sender.id).await?;

        if let Some(parent_id) = parent_id {
            let parent = self.store.messages().get(parent_id).await?.ok_or_else(|| {
                MessagingError::Validation(format!("Parent message {parent_id} not found"))
            })?;
            if parent.conversation_id != conversation_id {
                return Err(MessagingError::Validation(
                    "Parent message belongs to another conversation".to_string(),
                ));
            }
        }

        let recipient_ids: Vec<String> = self
            .store
            .conversations()
            .participant_ids(conversation_id)
            .await?
            .into_iter()
            .filter(|id| *id != sender.id)
            .collect();

        let observers = self.observers.clone();
        let conversation_id = conversation_id.to_string();
        let sender_id = sender.id.clone();
        let sender_username = sender.username.clone();
        let body = body.to_string();
        let parent_id = parent_id.map(str::to_string);

        let (message, event) = transactional(&self.store.conn, move |txn| {
            Box::pin(async move {
                let message = MessageRepository::new(txn)
                    .create(&conversation_id, &sender_id, &body, parent_id.as_deref())
                    .await?;
                let event = MessagingEvent::MessageCreated {
                    message_id: message.id.clone(),
                    conversation_id,
                    sender_id,
                    sender_username,
                    recipient_ids,
                };
                observers.dispatch(txn, &event).await?;
                Ok::<_, MessagingError>((message, event))
            })
        })
        .await?;

        debug!(message_id = %message.id, "Message sent");
        self.publish(event);
        Ok(MessageView::from_model(message, Some(sender.username.clone())))
    }

    async fn list_messages(
        &self,
        user: &users::Model,
        filter: MessageFilter,
    ) -> Result<Page<MessageView>, MessagingError> {
        let conversation_ids = self.store.conversations().ids_for_user(&user.id).await?;

        if let Some(requested) = &filter.conversation_id
            && !conversation_ids.contains(requested)
        {
            return Err(MessagingError::Forbidden(
                "You are not a participant of this conversation".to_string(),
            ));
        }

        let page = filter.page.max(1);
        let page_size = filter.page_size.clamp(1, MAX_PAGE_SIZE);
        let query = MessageQuery {
            conversation_ids,
            conversation_id: filter.conversation_id,
            sender_id: filter.sender,
            sent_after: normalize_instant("sent_after", filter.sent_after)?,
            sent_before: normalize_instant("sent_before", filter.sent_before)?,
        };

        let (items, total) = self.store.messages().search(&query, page, page_size).await?;

        Ok(Page {
            items: self.views(items).await?,
            total,
            page,
            page_size,
        })
    }

    async fn get_message(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<MessageView, MessagingError> {
        let message = self.visible_message(user, message_id).await?;
        let mut views = self.views(vec![message]).await?;
        views
            .pop()
            .ok_or_else(|| MessagingError::message_not_found(message_id))
    }

    async fn thread(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<ThreadNode, MessagingError> {
        let root = self.visible_message(user, message_id).await?;
        let root_id = root.id.clone();

        let mut frontier = vec![root.id.clone()];
        let mut all = vec![root];
        while !frontier.is_empty() {
            let replies = self.store.messages().replies_to(&frontier).await?;
            frontier = replies.iter().map(|m| m.id.clone()).collect();
            all.extend(replies);
        }

        let mut root_view = None;
        let mut children: HashMap<String, Vec<MessageView>> = HashMap::new();
        for view in self.views(all).await? {
            if view.id == root_id {
                root_view = Some(view);
            } else if let Some(parent) = view.parent_message_id.clone() {
                children.entry(parent).or_default().push(view);
            }
        }

        let root_view = root_view.ok_or_else(|| MessagingError::message_not_found(message_id))?;
        Ok(build_thread(root_view, &mut children))
    }

    async fn edit_message(
        &self,
        editor: &users::Model,
        message_id: &str,
        new_body: &str,
    ) -> Result<MessageView, MessagingError> {
        let new_body = new_body.trim();
        if new_body.is_empty() {
            return Err(MessagingError::Validation(
                "Message body is required".to_string(),
            ));
        }

        let message = self.visible_message(editor, message_id).await?;
        if message.sender_id != editor.id {
            return Err(MessagingError::Forbidden(
                "Only the sender can edit this message".to_string(),
            ));
        }

        if message.body == new_body {
            return Ok(MessageView::from_model(message, Some(editor.username.clone())));
        }

        let participant_ids = self
            .store
            .conversations()
            .participant_ids(&message.conversation_id)
            .await?;

        let observers = self.observers.clone();
        let editor_id = editor.id.clone();
        let new_body = new_body.to_string();

        let (updated, event) = transactional(&self.store.conn, move |txn| {
            Box::pin(async move {
                let previous_body = message.body.clone();
                let conversation_id = message.conversation_id.clone();
                let updated = MessageRepository::new(txn)
                    .update_body(message, &new_body, &editor_id)
                    .await?;
                let event = MessagingEvent::MessageEdited {
                    message_id: updated.id.clone(),
                    conversation_id,
                    edited_by: editor_id,
                    previous_body,
                    participant_ids,
                };
                observers.dispatch(txn, &event).await?;
                Ok::<_, MessagingError>((updated, event))
            })
        })
        .await?;

        self.publish(event);
        Ok(MessageView::from_model(updated, Some(editor.username.clone())))
    }

    async fn message_history(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<Vec<HistoryEntry>, MessagingError> {
        self.visible_message(user, message_id).await?;
        Ok(self.store.messages().history(message_id).await?)
    }

    async fn delete_message(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<(), MessagingError> {
        let message = self.visible_message(user, message_id).await?;
        if message.sender_id != user.id {
            return Err(MessagingError::Forbidden(
                "Only the sender can delete this message".to_string(),
            ));
        }

        self.store.messages().delete(message_id).await?;
        Ok(())
    }

    async fn unread_for_user(
        &self,
        user: &users::Model,
    ) -> Result<Vec<UnreadMessage>, MessagingError> {
        let conversation_ids = self.store.conversations().ids_for_user(&user.id).await?;
        let unread = self
            .store
            .messages()
            .unread_for(&user.id, &conversation_ids)
            .await?;

        let sender_ids: Vec<String> = unread
            .iter()
            .map(|m| m.sender_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let names = self.usernames(&sender_ids).await?;

        Ok(unread
            .into_iter()
            .map(|m| UnreadMessage {
                sender_username: names.get(&m.sender_id).cloned(),
                id: m.id,
                body: m.body,
                sent_at: m.sent_at,
            })
            .collect())
    }

    async fn mark_as_read(
        &self,
        user: &users::Model,
        message_id: &str,
    ) -> Result<(), MessagingError> {
        let message = self.visible_message(user, message_id).await?;
        if message.sender_id == user.id {
            return Err(MessagingError::Validation(
                "Cannot mark your own message as read".to_string(),
            ));
        }

        let user_id = user.id.clone();
        let message_id = message.id;
        transactional(&self.store.conn, move |txn| {
            Box::pin(async move {
                MessageRepository::new(txn)
                    .mark_read(&message_id, &user_id)
                    .await?;
                NotificationRepository::new(txn)
                    .mark_read_for_message(&user_id, &message_id)
                    .await?;
                Ok::<_, MessagingError>(())
            })
        })
        .await
    }

    async fn notifications(
        &self,
        user: &users::Model,
        unread_only: bool,
    ) -> Result<Vec<NotificationView>, MessagingError> {
        Ok(self
            .store
            .notifications()
            .list_for_user(&user.id, unread_only)
            .await?)
    }

    async fn mark_notification_read(
        &self,
        user: &users::Model,
        notification_id: i32,
    ) -> Result<(), MessagingError> {
        if self
            .store
            .notifications()
            .mark_read(&user.id, notification_id)
            .await?
        {
            Ok(())
        } else {
            Err(MessagingError::NotFound(format!(
                "Notification {notification_id}"
            )))
        }
    }

    async fn delete_account(&self, user: &users::Model) -> Result<(), MessagingError> {
        let observers = self.observers.clone();
        let user_id = user.id.clone();
        let username = user.username.clone();

        let event = transactional(&self.store.conn, move |txn| {
            Box::pin(async move {
                if !UserRepository::new(txn).delete(&user_id).await? {
                    return Err(MessagingError::NotFound(format!("User {user_id}")));
                }
                let event = MessagingEvent::UserDeleted { user_id, username };
                observers.dispatch(txn, &event).await?;
                Ok::<_, MessagingError>(event)
            })
        })
        .await?;

        info!(user = %user.username, "Account deleted");
        self.publish(event);
        Ok(())
    }
}
