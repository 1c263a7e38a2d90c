use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::message::MessageContent;
use crate::services::chat_service::ChatService;
use crate::services::message_service::MessagePage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub content: MessageContent,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub is_forwarded: bool,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub id: Uuid,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<SendMessageResponse>)> {
    let message = ChatService::send_message(
        &state,
        conversation_id,
        body.sender_id,
        body.content,
        body.reply_to,
        body.is_forwarded,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            id: message.id,
            seq: message.seq,
            created_at: message.created_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

pub async fn get_message_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<MessagePage>> {
    let page = ChatService::list_messages(
        &state,
        conversation_id,
        params.page_token.as_deref(),
        params.page_size,
    )
    .await?;
    Ok(Json(page))
}
