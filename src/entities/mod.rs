pub mod prelude;

pub mod conversation_participants;
pub mod conversations;
pub mod message_history;
pub mod message_reads;
pub mod messages;
pub mod notifications;
pub mod users;
