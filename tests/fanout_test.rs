//! Fan-out dispatcher behavior: ordered push, sender skipping, bounded
//! buffers and the polling fallback after a disconnect.

use messaging_core::config::Config;
use messaging_core::models::conversation::ConversationKind;
use messaging_core::models::message::MessageContent;
use messaging_core::services::chat_service::ChatService;
use messaging_core::state::AppState;
use messaging_core::websocket::events::WsEvent;
use uuid::Uuid;

fn test_state() -> AppState {
    AppState::new(Config::test_defaults())
}

fn text(body: &str) -> MessageContent {
    MessageContent::Text { body: body.into() }
}

async fn direct(state: &AppState, a: Uuid, b: Uuid) -> Uuid {
    ChatService::create_conversation(state, ConversationKind::Direct, vec![a, b], None, None)
        .await
        .unwrap()
        .id
}

fn body_of(event: &WsEvent) -> String {
    match event {
        WsEvent::MessageNew { message, .. } => match &message.content {
            MessageContent::Text { body } => body.clone(),
            other => panic!("unexpected content: {other:?}"),
        },
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn subscribers_receive_messages_in_store_order() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = direct(&state, u1, u2).await;

    let mut subscription = state.registry.subscribe(conversation_id, u2).await;
    for body in ["first", "second", "third"] {
        ChatService::send_message(&state, conversation_id, u1, text(body), None, false)
            .await
            .unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(body_of(&subscription.receiver.recv().await.unwrap()));
    }
    assert_eq!(received, ["first", "second", "third"]);
}

#[tokio::test]
async fn sender_connections_are_skipped_by_default() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = direct(&state, u1, u2).await;

    let mut sender_sub = state.registry.subscribe(conversation_id, u1).await;
    let mut peer_sub = state.registry.subscribe(conversation_id, u2).await;

    ChatService::send_message(&state, conversation_id, u1, text("hello"), None, false)
        .await
        .unwrap();

    assert_eq!(body_of(&peer_sub.receiver.recv().await.unwrap()), "hello");
    assert!(
        sender_sub.receiver.try_recv().is_err(),
        "sender's own connection must not receive the push"
    );
}

#[tokio::test]
async fn slow_subscriber_is_dropped_without_blocking_the_sender() {
    // test_defaults uses a buffer of 8 frames.
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = direct(&state, u1, u2).await;

    let mut stalled = state.registry.subscribe(conversation_id, u2).await;
    assert_eq!(state.registry.subscriber_count(conversation_id).await, 1);

    // Never drained: the 9th push overflows and evicts the subscriber.
    for i in 0..10 {
        ChatService::send_message(&state, conversation_id, u1, text(&format!("m{i}")), None, false)
            .await
            .unwrap();
    }
    assert_eq!(state.registry.subscriber_count(conversation_id).await, 0);

    // The frames that fit are still delivered in order, then the channel
    // closes; everything else is recovered by polling.
    let mut delivered = 0;
    while let Some(event) = stalled.receiver.recv().await {
        assert_eq!(body_of(&event), format!("m{delivered}"));
        delivered += 1;
    }
    assert_eq!(delivered, 8);

    // Appends were never blocked; the log has all ten.
    let page = ChatService::list_messages(&state, conversation_id, None, Some(20))
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 10);

    // A fresh subscription starts clean.
    let mut fresh = state.registry.subscribe(conversation_id, u2).await;
    ChatService::send_message(&state, conversation_id, u1, text("again"), None, false)
        .await
        .unwrap();
    assert_eq!(body_of(&fresh.receiver.recv().await.unwrap()), "again");
}

#[tokio::test]
async fn disconnected_subscriber_catches_up_by_polling() {
    // Scenario E: disconnect, two messages arrive, then a poll returns both
    // in order, exactly once.
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = direct(&state, u1, u2).await;

    let mut subscription = state.registry.subscribe(conversation_id, u2).await;
    ChatService::send_message(&state, conversation_id, u1, text("live"), None, false)
        .await
        .unwrap();
    assert_eq!(body_of(&subscription.receiver.recv().await.unwrap()), "live");

    // Disconnect.
    state
        .registry
        .unsubscribe(conversation_id, subscription.id)
        .await;
    drop(subscription);
    assert_eq!(state.registry.subscriber_count(conversation_id).await, 0);

    ChatService::send_message(&state, conversation_id, u1, text("missed-1"), None, false)
        .await
        .unwrap();
    ChatService::send_message(&state, conversation_id, u1, text("missed-2"), None, false)
        .await
        .unwrap();

    // Poll: newest first, reverse for send order.
    let page = ChatService::list_messages(&state, conversation_id, None, Some(10))
        .await
        .unwrap();
    let mut bodies: Vec<String> = page
        .messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::Text { body } => body.clone(),
            other => panic!("unexpected content: {other:?}"),
        })
        .collect();
    bodies.reverse();
    assert_eq!(bodies, ["live", "missed-1", "missed-2"]);
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = direct(&state, u1, u2).await;

    let subscription = state.registry.subscribe(conversation_id, u2).await;
    state
        .registry
        .unsubscribe(conversation_id, subscription.id)
        .await;
    state
        .registry
        .unsubscribe(conversation_id, subscription.id)
        .await;
    assert_eq!(state.registry.subscriber_count(conversation_id).await, 0);
}

#[tokio::test]
async fn read_receipts_are_pushed_to_subscribers() {
    let state = test_state();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation_id = direct(&state, u1, u2).await;
    let message = ChatService::send_message(&state, conversation_id, u1, text("hi"), None, false)
        .await
        .unwrap();

    let mut sender_sub = state.registry.subscribe(conversation_id, u1).await;
    ChatService::mark_read(&state, conversation_id, u2, message.id)
        .await
        .unwrap();

    match sender_sub.receiver.recv().await.unwrap() {
        WsEvent::MessageRead {
            message_id,
            user_id,
            ..
        } => {
            assert_eq!(message_id, message.id);
            assert_eq!(user_id, u2);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
