use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::conversation::{Conversation, ConversationKind};
use crate::services::chat_service::ChatService;
use crate::services::conversation_service::ConversationOverview;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub kind: ConversationKind,
    pub participants: Vec<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> AppResult<(StatusCode, Json<Conversation>)> {
    let conversation = ChatService::create_conversation(
        &state,
        body.kind,
        body.participants,
        body.name,
        body.image_url,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Conversation>> {
    Ok(Json(ChatService::get_conversation(&state, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsParams {
    pub user_id: Uuid,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(params): Query<ListConversationsParams>,
) -> Json<Vec<ConversationOverview>> {
    Json(ChatService::list_conversations_for_user(&state, params.user_id).await)
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub user_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub last_read_message_id: Option<Uuid>,
    pub unread_count: u64,
}

pub async fn mark_as_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MarkReadRequest>,
) -> AppResult<Json<MarkReadResponse>> {
    let cursor = ChatService::mark_read(&state, id, body.user_id, body.message_id).await?;
    Ok(Json(MarkReadResponse {
        conversation_id: cursor.conversation_id,
        user_id: cursor.user_id,
        last_read_message_id: cursor.last_read_message_id,
        unread_count: cursor.unread_count,
    }))
}
