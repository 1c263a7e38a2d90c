use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Admin,
    Member,
}

/// Per (conversation, participant) read state. Created when the participant
/// joins and kept for as long as they remain in the conversation. The store
/// is the sole mutator of `unread_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadCursor {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_message_id: Option<Uuid>,
    pub unread_count: u64,
    pub is_muted: bool,
    pub joined_at: DateTime<Utc>,
    pub role: ParticipantRole,
}
