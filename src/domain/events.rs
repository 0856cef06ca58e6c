//! Domain events for the messaging system.
//!
//! Events are handed to the observers inside the write transaction and,
//! after commit, broadcast on the event bus to SSE subscribers.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum MessagingEvent {
    MessageCreated {
        message_id: String,
        conversation_id: String,
        sender_id: String,
        sender_username: String,
        /// Participants other than the sender.
        recipient_ids: Vec<String>,
    },

    MessageEdited {
        message_id: String,
        conversation_id: String,
        edited_by: String,
        previous_body: String,
        participant_ids: Vec<String>,
    },

    UserDeleted {
        user_id: String,
        username: String,
    },
}

impl MessagingEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message_created",
            Self::MessageEdited { .. } => "message_edited",
            Self::UserDeleted { .. } => "user_deleted",
        }
    }

    /// Whether a subscriber logged in as `user_id` should receive this event.
    #[must_use]
    pub fn concerns(&self, user_id: &str) -> bool {
        match self {
            Self::MessageCreated {
                sender_id,
                recipient_ids,
                ..
            } => sender_id == user_id || recipient_ids.iter().any(|id| id == user_id),
            Self::MessageEdited {
                participant_ids, ..
            } => participant_ids.iter().any(|id| id == user_id),
            Self::UserDeleted { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let event = MessagingEvent::UserDeleted {
            user_id: "u1".into(),
            username: "alice".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "UserDeleted");
        assert_eq!(json["payload"]["username"], "alice");
    }

    #[test]
    fn test_concerns_only_participants() {
        let event = MessagingEvent::MessageCreated {
            message_id: "m".into(),
            conversation_id: "c".into(),
            sender_id: "a".into(),
            sender_username: "alice".into(),
            recipient_ids: vec!["b".into()],
        };
        assert!(event.concerns("a"));
        assert!(event.concerns("b"));
        assert!(!event.concerns("z"));
    }
}
