use missive::config::Config;
use missive::db::repositories::user::NewUser;
use missive::domain::MessagingEvent;
use missive::entities::users;
use missive::services::{MessagingError, MessagingService};
use missive::state::SharedState;
use std::path::PathBuf;

struct TestEnv {
    shared: SharedState,
    db_path: PathBuf,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

async fn setup() -> TestEnv {
    let db_path =
        std::env::temp_dir().join(format!("missive-messaging-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.observability.request_log_path = String::new();
    config.access.retry_delay_ms = 0;

    let shared = SharedState::new(config)
        .await
        .expect("Failed to create shared state");

    TestEnv { shared, db_path }
}

async fn add_user(env: &TestEnv, username: &str) -> users::Model {
    env.shared
        .store
        .users()
        .create(NewUser {
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: "Tester".to_string(),
            email: format!("{username}@example.com"),
            phone_number: None,
            age: Some(30),
            role: "guest".to_string(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_send_message_notifies_other_participants() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let carol = add_user(&env, "carol").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone(), carol.id.clone(), alice.id.clone()])
        .await
        .unwrap();
    assert_eq!(conversation.conversation.participants.len(), 3);

    let mut events = env.shared.event_bus.subscribe();

    let message = messaging
        .send_message(&alice, &conversation.conversation.id, "Hello both", None)
        .await
        .unwrap();
    assert_eq!(message.sender_username.as_deref(), Some("alice"));

    for recipient in [&bob, &carol] {
        let notifications = messaging.notifications(recipient, true).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].text, "New message from alice");
        assert_eq!(notifications[0].message_id, message.id);
    }
    assert!(messaging.notifications(&alice, false).await.unwrap().is_empty());

    match events.recv().await.unwrap() {
        MessagingEvent::MessageCreated { recipient_ids, .. } => {
            assert_eq!(recipient_ids.len(), 2);
            assert!(!recipient_ids.contains(&alice.id));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_mark_notification_read() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    messaging
        .send_message(&alice, &conversation.conversation.id, "ping", None)
        .await
        .unwrap();

    let notification = messaging.notifications(&bob, true).await.unwrap().remove(0);

    // Someone else's notification looks missing.
    let err = messaging
        .mark_notification_read(&alice, notification.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::NotFound(_)));

    messaging
        .mark_notification_read(&bob, notification.id)
        .await
        .unwrap();
    assert!(messaging.notifications(&bob, true).await.unwrap().is_empty());
    assert_eq!(messaging.notifications(&bob, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_records_history() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    let message = messaging
        .send_message(&alice, &conversation.conversation.id, "first draft", None)
        .await
        .unwrap();

    let edited = messaging
        .edit_message(&alice, &message.id, "second draft")
        .await
        .unwrap();
    assert!(edited.edited);
    assert_eq!(edited.body, "second draft");
    assert_eq!(edited.edited_by.as_deref(), Some(alice.id.as_str()));

    messaging
        .edit_message(&alice, &message.id, "final")
        .await
        .unwrap();

    // Same body again is not a new revision.
    messaging
        .edit_message(&alice, &message.id, "final")
        .await
        .unwrap();

    let history = messaging.message_history(&bob, &message.id).await.unwrap();
    let bodies: Vec<&str> = history.iter().map(|h| h.old_body.as_str()).collect();
    assert_eq!(bodies, vec!["second draft", "first draft"]);

    let err = messaging
        .edit_message(&bob, &message.id, "not mine")
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Forbidden(_)));
}

#[tokio::test]
async fn test_outsiders_cannot_read_conversation() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let mallory = add_user(&env, "mallory").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    let message = messaging
        .send_message(&alice, &conversation.conversation.id, "private", None)
        .await
        .unwrap();

    let err = messaging
        .get_conversation(&mallory, &conversation.conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Forbidden(_)));

    let err = messaging.get_message(&mallory, &message.id).await.unwrap_err();
    assert!(matches!(err, MessagingError::Forbidden(_)));

    let err = messaging
        .send_message(&mallory, &conversation.conversation.id, "let me in", None)
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Forbidden(_)));

    assert!(messaging.list_conversations(&mallory).await.unwrap().is_empty());
    assert!(messaging.unread_for_user(&mallory).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conversation_requires_known_participants() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let messaging = &env.shared.messaging;

    let err = messaging
        .create_conversation(&alice, vec![alice.id.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Validation(_)));

    let err = messaging
        .create_conversation(&alice, vec!["no-such-user".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Validation(_)));
}

#[tokio::test]
async fn test_thread_collects_nested_replies() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    let conversation_id = conversation.conversation.id.as_str();

    let root = messaging
        .send_message(&alice, conversation_id, "root", None)
        .await
        .unwrap();
    let reply = messaging
        .send_message(&bob, conversation_id, "reply", Some(&root.id))
        .await
        .unwrap();
    messaging
        .send_message(&alice, conversation_id, "nested", Some(&reply.id))
        .await
        .unwrap();
    messaging
        .send_message(&bob, conversation_id, "second reply", Some(&root.id))
        .await
        .unwrap();

    let thread = messaging.thread(&alice, &root.id).await.unwrap();
    assert_eq!(thread.size(), 4);
    assert_eq!(thread.replies.len(), 2);

    let err = messaging
        .send_message(&alice, conversation_id, "orphan", Some("missing-parent"))
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Validation(_)));
}

#[tokio::test]
async fn test_unread_inbox() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    let message = messaging
        .send_message(&alice, &conversation.conversation.id, "are you there?", None)
        .await
        .unwrap();

    let unread = messaging.unread_for_user(&bob).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].sender_username.as_deref(), Some("alice"));

    // Own messages never show up as unread.
    assert!(messaging.unread_for_user(&alice).await.unwrap().is_empty());

    messaging.mark_as_read(&bob, &message.id).await.unwrap();
    assert!(messaging.unread_for_user(&bob).await.unwrap().is_empty());

    // Marking twice is harmless.
    messaging.mark_as_read(&bob, &message.id).await.unwrap();
    assert!(messaging.notifications(&bob, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_state_is_per_recipient() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let carol = add_user(&env, "carol").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone(), carol.id.clone()])
        .await
        .unwrap();
    let message = messaging
        .send_message(&alice, &conversation.conversation.id, "hello group", None)
        .await
        .unwrap();

    messaging.mark_as_read(&bob, &message.id).await.unwrap();
    assert!(messaging.unread_for_user(&bob).await.unwrap().is_empty());

    let carol_unread = messaging.unread_for_user(&carol).await.unwrap();
    assert_eq!(carol_unread.len(), 1);
    assert_eq!(carol_unread[0].id, message.id);
    assert_eq!(messaging.notifications(&carol, true).await.unwrap().len(), 1);

    // The sender cannot clear the message for its recipients.
    let err = messaging.mark_as_read(&alice, &message.id).await.unwrap_err();
    assert!(matches!(err, MessagingError::Validation(_)));
    assert_eq!(messaging.unread_for_user(&carol).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_account_removes_authored_content() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    let conversation_id = conversation.conversation.id.clone();

    let from_alice = messaging
        .send_message(&alice, &conversation_id, "from alice", None)
        .await
        .unwrap();
    messaging
        .send_message(&bob, &conversation_id, "from bob", Some(&from_alice.id))
        .await
        .unwrap();

    messaging.delete_account(&bob).await.unwrap();

    assert!(env.shared.store.users().get(&bob.id).await.unwrap().is_none());

    let detail = messaging
        .get_conversation(&alice, &conversation_id)
        .await
        .unwrap();
    assert_eq!(detail.messages.len(), 1);
    assert_eq!(detail.messages[0].id, from_alice.id);
    assert_eq!(detail.conversation.participants.len(), 1);

    let err = messaging.delete_account(&bob).await.unwrap_err();
    assert!(matches!(err, MessagingError::NotFound(_)));
}

#[tokio::test]
async fn test_list_messages_filters_and_paginates() {
    let env = setup().await;
    let alice = add_user(&env, "alice").await;
    let bob = add_user(&env, "bob").await;
    let messaging = &env.shared.messaging;

    let conversation = messaging
        .create_conversation(&alice, vec![bob.id.clone()])
        .await
        .unwrap();
    let conversation_id = conversation.conversation.id.clone();

    for i in 0..5 {
        messaging
            .send_message(&alice, &conversation_id, &format!("alice {i}"), None)
            .await
            .unwrap();
    }
    messaging
        .send_message(&bob, &conversation_id, "bob 0", None)
        .await
        .unwrap();

    let filter: missive::services::messaging_service::MessageFilter =
        serde_json::from_value(serde_json::json!({
            "sender": alice.id,
            "page": 1,
            "page_size": 2
        }))
        .unwrap();

    let page = messaging.list_messages(&bob, filter).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|m| m.sender_id == alice.id));
}
