use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, ConversationKind};
use crate::models::cursor::{ParticipantRole, ReadCursor};
use crate::store::Store;

/// A conversation as seen by one participant: the shared record plus that
/// participant's unread badge and membership state.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationOverview {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: u64,
    pub is_muted: bool,
    pub role: ParticipantRole,
}

pub struct ConversationService;

impl ConversationService {
    /// Creates a conversation and a read cursor for every participant.
    /// Direct conversations hold exactly two distinct participants and carry
    /// no display name; the group creator (first participant) is the sole
    /// initial admin.
    pub async fn create(
        store: &Store,
        kind: ConversationKind,
        participants: Vec<Uuid>,
        name: Option<String>,
        image_url: Option<String>,
    ) -> AppResult<Conversation> {
        let mut seen = HashSet::new();
        for participant in &participants {
            if !seen.insert(*participant) {
                return Err(AppError::InvalidArgument(
                    "participants must be unique".into(),
                ));
            }
        }
        match kind {
            ConversationKind::Direct => {
                if participants.len() != 2 {
                    return Err(AppError::InvalidArgument(
                        "a direct conversation requires exactly two participants".into(),
                    ));
                }
                if name.is_some() || image_url.is_some() {
                    return Err(AppError::InvalidArgument(
                        "name and image are group-only fields".into(),
                    ));
                }
            }
            ConversationKind::Group => {
                if participants.len() < 2 {
                    return Err(AppError::InvalidArgument(
                        "a group conversation requires at least two participants".into(),
                    ));
                }
            }
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind,
            participants: participants.clone(),
            name,
            image_url,
            created_at: now,
            updated_at: now,
            last_message: None,
        };
        let cursors = participants
            .iter()
            .enumerate()
            .map(|(idx, &user_id)| ReadCursor {
                conversation_id: conversation.id,
                user_id,
                last_read_message_id: None,
                unread_count: 0,
                is_muted: false,
                joined_at: now,
                role: if kind == ConversationKind::Group && idx == 0 {
                    ParticipantRole::Admin
                } else {
                    ParticipantRole::Member
                },
            })
            .collect();

        store.insert_conversation(conversation.clone(), cursors).await;
        Ok(conversation)
    }

    pub async fn get(store: &Store, conversation_id: Uuid) -> AppResult<Conversation> {
        store.get_conversation(conversation_id).await
    }

    pub async fn is_participant(
        store: &Store,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<bool> {
        store.is_participant(conversation_id, user_id).await
    }

    /// All conversations where the user currently participates, ordered by
    /// `updated_at` descending.
    pub async fn list_for_user(store: &Store, user_id: Uuid) -> Vec<ConversationOverview> {
        store
            .list_for_user(user_id)
            .await
            .into_iter()
            .map(|(conversation, cursor)| ConversationOverview {
                conversation,
                unread_count: cursor.unread_count,
                is_muted: cursor.is_muted,
                role: cursor.role,
            })
            .collect()
    }
}
