use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::message::{Message, MessageContent};
use crate::store::Store;

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

pub struct MessageService;

impl MessageService {
    pub fn validate_content(content: &MessageContent) -> AppResult<()> {
        match content {
            MessageContent::Text { body } | MessageContent::System { body } => {
                if body.trim().is_empty() {
                    return Err(AppError::InvalidArgument(
                        "message body must not be empty".into(),
                    ));
                }
            }
            MessageContent::Image { url, .. }
            | MessageContent::Video { url, .. }
            | MessageContent::Audio { url, .. }
            | MessageContent::File { url, .. } => {
                if url.trim().is_empty() {
                    return Err(AppError::InvalidArgument("media url is required".into()));
                }
            }
            MessageContent::Location {
                latitude,
                longitude,
                ..
            } => {
                if !(-90.0..=90.0).contains(latitude) || !(-180.0..=180.0).contains(longitude) {
                    return Err(AppError::InvalidArgument(
                        "location coordinates out of range".into(),
                    ));
                }
            }
            MessageContent::Contact {
                name, phone_number, ..
            } => {
                if name.trim().is_empty() || phone_number.trim().is_empty() {
                    return Err(AppError::InvalidArgument(
                        "contact name and phone number are required".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validates and appends. Once this returns `Ok`, the message is
    /// committed and immediately visible to `list_messages`.
    pub async fn append(
        store: &Store,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: MessageContent,
        reply_to: Option<Uuid>,
        is_forwarded: bool,
    ) -> AppResult<Message> {
        Self::validate_content(&content)?;
        store
            .append_message(conversation_id, sender_id, content, reply_to, is_forwarded)
            .await
    }

    /// Newest-first page. The token is an opaque encoding of the last
    /// returned `(created_at, seq)` key, so resuming stays duplicate- and
    /// gap-free even while new messages arrive.
    pub async fn list_messages(
        store: &Store,
        conversation_id: Uuid,
        page_token: Option<&str>,
        page_size: Option<usize>,
        config: &Config,
    ) -> AppResult<MessagePage> {
        let limit = page_size
            .unwrap_or(config.page_size_default)
            .clamp(1, config.page_size_max);
        let before = page_token.map(decode_page_token).transpose()?;
        let (messages, next) = store.list_messages(conversation_id, before, limit).await?;
        Ok(MessagePage {
            messages,
            next_page_token: next.map(|(ts, seq)| encode_page_token(ts, seq)),
        })
    }
}

fn encode_page_token(ts_micros: i64, seq: u64) -> String {
    URL_SAFE_NO_PAD.encode(format!("{ts_micros}:{seq}"))
}

fn decode_page_token(token: &str) -> AppResult<(i64, u64)> {
    let malformed = || AppError::InvalidArgument("malformed page token".into());
    let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| malformed())?;
    let text = String::from_utf8(raw).map_err(|_| malformed())?;
    let (ts, seq) = text.split_once(':').ok_or_else(malformed)?;
    Ok((
        ts.parse().map_err(|_| malformed())?,
        seq.parse().map_err(|_| malformed())?,
    ))
}
