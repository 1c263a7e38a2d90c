use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    File,
    Location,
    Contact,
    System,
}

/// Type-tagged message payload. The tag doubles as the message type exposed
/// in conversation summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Audio {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    File {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_bytes: Option<u64>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
    Contact {
        name: String,
        phone_number: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
    System {
        body: String,
    },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::Image { .. } => MessageKind::Image,
            MessageContent::Video { .. } => MessageKind::Video,
            MessageContent::Audio { .. } => MessageKind::Audio,
            MessageContent::File { .. } => MessageKind::File,
            MessageContent::Location { .. } => MessageKind::Location,
            MessageContent::Contact { .. } => MessageKind::Contact,
            MessageContent::System { .. } => MessageKind::System,
        }
    }

    /// Short text used for the conversation's cached last-message summary.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = match self {
            MessageContent::Text { body } | MessageContent::System { body } => body.as_str(),
            MessageContent::Image { .. } => "[image]",
            MessageContent::Video { .. } => "[video]",
            MessageContent::Audio { .. } => "[audio]",
            MessageContent::File { file_name, .. } => {
                file_name.as_deref().unwrap_or("[file]")
            }
            MessageContent::Location { .. } => "[location]",
            MessageContent::Contact { name, .. } => name.as_str(),
        };
        truncate_chars(text, max_chars)
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub delivered_at: DateTime<Utc>,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    pub is_forwarded: bool,
    /// Store-assigned insertion sequence, strictly increasing per
    /// conversation. Ties on `created_at` are ordered by this.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    /// Per-participant receipts; always contains at least the sender.
    pub read_by: HashMap<Uuid, ReadReceipt>,
}
