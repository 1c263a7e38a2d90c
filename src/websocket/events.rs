//! Wire events for the websocket surface. Every outbound event carries a
//! `type` field with an `object.action` name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    #[serde(rename = "message.new")]
    MessageNew {
        conversation_id: Uuid,
        message: Message,
    },

    #[serde(rename = "message.read")]
    MessageRead {
        conversation_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    },
}

impl WsEvent {
    pub fn message_new(message: &Message) -> Self {
        WsEvent::MessageNew {
            conversation_id: message.conversation_id,
            message: message.clone(),
        }
    }
}

/// Events a connected client may send over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "mark_read")]
    MarkRead { message_id: Uuid },
}
