use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod conversations;
pub mod messages;

use conversations::{create_conversation, get_conversation, list_conversations, mark_as_read};
use messages::{get_message_history, send_message};

pub fn build_router() -> Router<AppState> {
    let api_v1 = Router::new()
        .route(
            "/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route("/conversations/:id", get(get_conversation))
        .route(
            "/conversations/:id/messages",
            post(send_message).get(get_message_history),
        )
        .route("/conversations/:id/read", post(mark_as_read));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ws", get(ws_handler))
        .nest("/api/v1", api_v1)
}
