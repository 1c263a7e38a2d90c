use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, ConversationKind};
use crate::models::cursor::ReadCursor;
use crate::models::message::{Message, MessageContent};
use crate::services::conversation_service::{ConversationOverview, ConversationService};
use crate::services::message_service::{MessagePage, MessageService};
use crate::services::read_tracker::ReadTracker;
use crate::state::AppState;
use crate::websocket::events::WsEvent;

/// Orchestrator composing the conversation registry, the message store, the
/// read tracker and the fan-out dispatcher into the public operations.
pub struct ChatService;

impl ChatService {
    pub async fn create_conversation(
        state: &AppState,
        kind: ConversationKind,
        participants: Vec<Uuid>,
        name: Option<String>,
        image_url: Option<String>,
    ) -> AppResult<Conversation> {
        ConversationService::create(&state.store, kind, participants, name, image_url).await
    }

    pub async fn get_conversation(state: &AppState, conversation_id: Uuid) -> AppResult<Conversation> {
        ConversationService::get(&state.store, conversation_id).await
    }

    pub async fn list_conversations_for_user(
        state: &AppState,
        user_id: Uuid,
    ) -> Vec<ConversationOverview> {
        ConversationService::list_for_user(&state.store, user_id).await
    }

    /// SendMessage state machine:
    /// Validating -> Persisting -> Summarizing/Counting -> Dispatching.
    /// The append is the durability boundary; everything after it is either
    /// transactional against the store (summary + unread counts) or
    /// best-effort (fan-out) and never rolls the message back.
    pub async fn send_message(
        state: &AppState,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: MessageContent,
        reply_to: Option<Uuid>,
        is_forwarded: bool,
    ) -> AppResult<Message> {
        // Validating: membership is checked before any mutation. A missing
        // conversation surfaces as NotFound here; there is no auto-create.
        if !ConversationService::is_participant(&state.store, conversation_id, sender_id).await? {
            return Err(AppError::PermissionDenied(
                "sender is not a participant of this conversation".into(),
            ));
        }

        // Persisting.
        let message = MessageService::append(
            &state.store,
            conversation_id,
            sender_id,
            content,
            reply_to,
            is_forwarded,
        )
        .await?;

        // Summarizing + counting, one transaction against the store. The
        // conversation cannot vanish between stages; if it somehow does the
        // failure is logged and the committed message is still reported to
        // the sender.
        if let Err(err) = state
            .store
            .apply_append_effects(&message, state.config.preview_max_chars)
            .await
        {
            error!(conversation_id = %conversation_id, error = %err, "post-append effects failed");
        }

        // Dispatching: fire-and-forget push to live subscribers.
        let skip = if state.config.echo_to_sender {
            None
        } else {
            Some(sender_id)
        };
        let delivered = state
            .registry
            .broadcast(conversation_id, WsEvent::message_new(&message), skip)
            .await;
        debug!(
            message_id = %message.id,
            seq = message.seq,
            delivered,
            "message dispatched"
        );

        Ok(message)
    }

    pub async fn list_messages(
        state: &AppState,
        conversation_id: Uuid,
        page_token: Option<&str>,
        page_size: Option<usize>,
    ) -> AppResult<MessagePage> {
        MessageService::list_messages(
            &state.store,
            conversation_id,
            page_token,
            page_size,
            &state.config,
        )
        .await
    }

    pub async fn mark_read(
        state: &AppState,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<ReadCursor> {
        // The message must belong to the named conversation.
        if state.store.conversation_of(message_id).await? != conversation_id {
            return Err(AppError::NotFound("message"));
        }
        let (cursor, read_at) =
            ReadTracker::mark_read(&state.store, conversation_id, user_id, message_id).await?;

        // Best-effort read receipt to live subscribers.
        let event = WsEvent::MessageRead {
            conversation_id,
            message_id,
            user_id,
            read_at,
        };
        state.registry.broadcast(conversation_id, event, None).await;
        Ok(cursor)
    }
}
