use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::chat_service::ChatService;
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;
use crate::websocket::events::WsInboundEvent;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    // Only participants may subscribe; the user id is trusted output of the
    // identity provider upstream of this service.
    if !ConversationService::is_participant(&state.store, params.conversation_id, params.user_id)
        .await?
    {
        return Err(AppError::PermissionDenied(
            "not a participant of this conversation".into(),
        ));
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, params)))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: WsParams) {
    let subscription = state
        .registry
        .subscribe(params.conversation_id, params.user_id)
        .await;
    let subscription_id = subscription.id;
    let mut events = subscription.receiver;
    let (mut sink, mut stream) = socket.split();

    debug!(
        conversation_id = %params.conversation_id,
        user_id = %params.user_id,
        subscription_id,
        "websocket subscribed"
    );

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let frame = match serde_json::to_string(&event) {
                            Ok(frame) => frame,
                            Err(err) => {
                                warn!(error = %err, "failed to serialize outbound event");
                                continue;
                            }
                        };
                        if sink.send(WsMessage::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    // Registry dropped us (buffer overflow); the client must
                    // reconnect and catch up via ListMessages.
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Ok(event) = serde_json::from_str::<WsInboundEvent>(&text) {
                            handle_inbound(&state, &params, event).await;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Closing the connection unsubscribes immediately and idempotently.
    state
        .registry
        .unsubscribe(params.conversation_id, subscription_id)
        .await;
    debug!(
        conversation_id = %params.conversation_id,
        subscription_id,
        "websocket unsubscribed"
    );
}

async fn handle_inbound(state: &AppState, params: &WsParams, event: WsInboundEvent) {
    match event {
        WsInboundEvent::MarkRead { message_id } => {
            if let Err(err) = ChatService::mark_read(
                state,
                params.conversation_id,
                params.user_id,
                message_id,
            )
            .await
            {
                warn!(error = %err, message_id = %message_id, "mark_read over websocket failed");
            }
        }
    }
}
