//! Unread counter and read-cursor behavior under appends, resets and
//! interleavings.

use messaging_core::config::Config;
use messaging_core::error::AppError;
use messaging_core::models::conversation::ConversationKind;
use messaging_core::models::message::MessageContent;
use messaging_core::services::chat_service::ChatService;
use messaging_core::services::read_tracker::ReadTracker;
use messaging_core::state::AppState;
use uuid::Uuid;

fn test_state() -> AppState {
    AppState::new(Config::test_defaults())
}

fn text(body: &str) -> MessageContent {
    MessageContent::Text { body: body.into() }
}

#[tokio::test]
async fn every_append_increments_all_other_participants() {
    let state = test_state();
    let (owner, m1, m2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let conversation = ChatService::create_conversation(
        &state,
        ConversationKind::Group,
        vec![owner, m1, m2],
        Some("badges".into()),
        None,
    )
    .await
    .unwrap();

    for i in 0..3 {
        ChatService::send_message(&state, conversation.id, owner, text(&format!("n{i}")), None, false)
            .await
            .unwrap();
    }

    assert_eq!(
        ReadTracker::unread_count(&state.store, conversation.id, owner)
            .await
            .unwrap(),
        0
    );
    for member in [m1, m2] {
        assert_eq!(
            ReadTracker::unread_count(&state.store, conversation.id, member)
                .await
                .unwrap(),
            3
        );
    }
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ChatService::create_conversation(
        &state,
        ConversationKind::Direct,
        vec![u1, u2],
        None,
        None,
    )
    .await
    .unwrap();
    let message = ChatService::send_message(&state, conversation.id, u1, text("hi"), None, false)
        .await
        .unwrap();

    let first = ChatService::mark_read(&state, conversation.id, u2, message.id)
        .await
        .unwrap();
    let second = ChatService::mark_read(&state, conversation.id, u2, message.id)
        .await
        .unwrap();
    assert_eq!(first.unread_count, second.unread_count);
    assert_eq!(first.last_read_message_id, second.last_read_message_id);

    // The receipt keeps its original timestamp across repeats.
    let page = ChatService::list_messages(&state, conversation.id, None, None)
        .await
        .unwrap();
    let receipt = page.messages[0].read_by.get(&u2).copied().unwrap();
    let third = ChatService::mark_read(&state, conversation.id, u2, message.id)
        .await
        .unwrap();
    assert_eq!(third.unread_count, 0);
    let page = ChatService::list_messages(&state, conversation.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.messages[0].read_by.get(&u2).copied().unwrap(), receipt);
}

#[tokio::test]
async fn read_then_append_counts_only_newer_messages() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ChatService::create_conversation(
        &state,
        ConversationKind::Direct,
        vec![u1, u2],
        None,
        None,
    )
    .await
    .unwrap();

    let m1 = ChatService::send_message(&state, conversation.id, u1, text("a"), None, false)
        .await
        .unwrap();
    ChatService::send_message(&state, conversation.id, u1, text("b"), None, false)
        .await
        .unwrap();
    assert_eq!(
        ReadTracker::unread_count(&state.store, conversation.id, u2)
            .await
            .unwrap(),
        2
    );

    // Whole-conversation read: even reading the older message clears all.
    ChatService::mark_read(&state, conversation.id, u2, m1.id)
        .await
        .unwrap();
    assert_eq!(
        ReadTracker::unread_count(&state.store, conversation.id, u2)
            .await
            .unwrap(),
        0
    );

    ChatService::send_message(&state, conversation.id, u1, text("c"), None, false)
        .await
        .unwrap();
    assert_eq!(
        ReadTracker::unread_count(&state.store, conversation.id, u2)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn unread_count_never_goes_negative_under_interleaving() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ChatService::create_conversation(
        &state,
        ConversationKind::Direct,
        vec![u1, u2],
        None,
        None,
    )
    .await
    .unwrap();
    let seed = ChatService::send_message(&state, conversation.id, u1, text("seed"), None, false)
        .await
        .unwrap();

    let appender = {
        let state = state.clone();
        let conversation_id = conversation.id;
        tokio::spawn(async move {
            for i in 0..20 {
                ChatService::send_message(
                    &state,
                    conversation_id,
                    u1,
                    text(&format!("m{i}")),
                    None,
                    false,
                )
                .await
                .unwrap();
            }
        })
    };
    let reader = {
        let state = state.clone();
        let conversation_id = conversation.id;
        tokio::spawn(async move {
            for _ in 0..20 {
                let cursor = ChatService::mark_read(&state, conversation_id, u2, seed.id)
                    .await
                    .unwrap();
                assert_eq!(cursor.unread_count, 0);
            }
        })
    };
    appender.await.unwrap();
    reader.await.unwrap();

    // Whatever the interleaving, the counter is bounded by the number of
    // messages that arrived after the last reset and is never negative
    // (the type is unsigned; the store clamps rather than wrapping).
    let count = ReadTracker::unread_count(&state.store, conversation.id, u2)
        .await
        .unwrap();
    assert!(count <= 21);
}

#[tokio::test]
async fn unknown_pairs_and_messages_are_not_found() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ChatService::create_conversation(
        &state,
        ConversationKind::Direct,
        vec![u1, u2],
        None,
        None,
    )
    .await
    .unwrap();
    let message = ChatService::send_message(&state, conversation.id, u1, text("x"), None, false)
        .await
        .unwrap();

    // Unknown message id.
    let err = ChatService::mark_read(&state, conversation.id, u2, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Known message, non-participant user.
    let err = ChatService::mark_read(&state, conversation.id, Uuid::new_v4(), message.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Message from a different conversation.
    let other = ChatService::create_conversation(
        &state,
        ConversationKind::Direct,
        vec![u1, u2],
        None,
        None,
    )
    .await
    .unwrap();
    let err = ChatService::mark_read(&state, other.id, u2, message.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("message")));
}

#[tokio::test]
async fn cursors_start_clean_at_join_time() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = ChatService::create_conversation(
        &state,
        ConversationKind::Direct,
        vec![u1, u2],
        None,
        None,
    )
    .await
    .unwrap();

    let cursor = ReadTracker::cursor(&state.store, conversation.id, u2)
        .await
        .unwrap();
    assert_eq!(cursor.unread_count, 0);
    assert_eq!(cursor.last_read_message_id, None);
    assert!(!cursor.is_muted);
    assert_eq!(cursor.joined_at, conversation.created_at);
}
