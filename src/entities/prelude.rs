pub use super::conversation_participants::Entity as ConversationParticipants;
pub use super::conversations::Entity as Conversations;
pub use super::message_history::Entity as MessageHistory;
pub use super::message_reads::Entity as MessageReads;
pub use super::messages::Entity as Messages;
pub use super::notifications::Entity as Notifications;
pub use super::users::Entity as Users;
