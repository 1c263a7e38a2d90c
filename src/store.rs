//! In-process backing store for conversations, message logs and read
//! cursors.
//!
//! Locking model: a read-mostly map from conversation id to a per-
//! conversation mutex. Appends and cursor updates for one conversation are
//! linearized by that mutex; operations on different conversations proceed
//! in parallel. There is no global write lock held across conversation
//! operations.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, LastMessage};
use crate::models::cursor::ReadCursor;
use crate::models::message::{Message, MessageContent, ReadReceipt};

struct ConversationState {
    conversation: Conversation,
    /// Append-only, ordered by (created_at, seq).
    log: Vec<Message>,
    cursors: HashMap<Uuid, ReadCursor>,
    next_seq: u64,
    /// Highest seq whose summary has been applied. Guards against a late
    /// `apply_append_effects` overwriting a newer last-message summary.
    last_summarized_seq: u64,
}

#[derive(Clone, Default)]
pub struct Store {
    conversations: Arc<RwLock<HashMap<Uuid, Arc<Mutex<ConversationState>>>>>,
    /// message id -> conversation id, for message-only lookups.
    message_index: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, conversation_id: Uuid) -> AppResult<Arc<Mutex<ConversationState>>> {
        self.conversations
            .read()
            .await
            .get(&conversation_id)
            .cloned()
            .ok_or(AppError::NotFound("conversation"))
    }

    pub async fn insert_conversation(&self, conversation: Conversation, cursors: Vec<ReadCursor>) {
        let id = conversation.id;
        let state = ConversationState {
            conversation,
            log: Vec::new(),
            cursors: cursors.into_iter().map(|c| (c.user_id, c)).collect(),
            next_seq: 1,
            last_summarized_seq: 0,
        };
        self.conversations
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(state)));
    }

    pub async fn get_conversation(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        let handle = self.handle(conversation_id).await?;
        let state = handle.lock().await;
        Ok(state.conversation.clone())
    }

    pub async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let handle = self.handle(conversation_id).await?;
        let state = handle.lock().await;
        Ok(state.conversation.participants.contains(&user_id))
    }

    /// All conversations the user participates in, paired with the user's
    /// cursor, newest activity first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Vec<(Conversation, ReadCursor)> {
        let handles: Vec<_> = self.conversations.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for handle in handles {
            let state = handle.lock().await;
            if let Some(cursor) = state.cursors.get(&user_id) {
                out.push((state.conversation.clone(), cursor.clone()));
            }
        }
        out.sort_by(|a, b| b.0.updated_at.cmp(&a.0.updated_at));
        out
    }

    /// Appends a message, assigning `(created_at, seq)` under the
    /// conversation lock. `created_at` never moves backwards even if the
    /// wall clock does; ties are ordered by `seq`. Once this returns the
    /// message is committed and visible to `list_messages`.
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: MessageContent,
        reply_to: Option<Uuid>,
        is_forwarded: bool,
    ) -> AppResult<Message> {
        let handle = self.handle(conversation_id).await?;
        let mut state = handle.lock().await;

        if let Some(parent) = reply_to {
            if !state.log.iter().any(|m| m.id == parent) {
                return Err(AppError::InvalidArgument(
                    "reply_to must reference a message in the same conversation".into(),
                ));
            }
        }

        let now = Utc::now();
        let created_at = match state.log.last() {
            Some(prev) if prev.created_at > now => prev.created_at,
            _ => now,
        };
        let seq = state.next_seq;
        state.next_seq += 1;

        let id = Uuid::new_v4();
        let mut read_by = HashMap::new();
        read_by.insert(
            sender_id,
            ReadReceipt {
                delivered_at: created_at,
                read_at: created_at,
            },
        );
        let message = Message {
            id,
            conversation_id,
            sender_id,
            content,
            reply_to,
            is_forwarded,
            seq,
            created_at,
            read_by,
        };
        state.log.push(message.clone());
        drop(state);

        self.message_index.write().await.insert(id, conversation_id);
        Ok(message)
    }

    /// Applies the post-append effects for an accepted message in one
    /// critical section: last-message summary, `updated_at`, and the unread
    /// increment for every participant other than the sender. Keeping these
    /// together is what keeps conversation lists and unread badges in
    /// agreement.
    pub async fn apply_append_effects(
        &self,
        message: &Message,
        preview_max_chars: usize,
    ) -> AppResult<()> {
        let handle = self.handle(message.conversation_id).await?;
        let mut state = handle.lock().await;

        if message.seq > state.last_summarized_seq {
            state.conversation.last_message = Some(LastMessage {
                message_id: message.id,
                preview: message.content.preview(preview_max_chars),
                sender_id: message.sender_id,
                sent_at: message.created_at,
                kind: message.content.kind(),
            });
            state.last_summarized_seq = message.seq;
        }
        if message.created_at > state.conversation.updated_at {
            state.conversation.updated_at = message.created_at;
        }
        for cursor in state.cursors.values_mut() {
            if cursor.user_id != message.sender_id {
                cursor.unread_count = cursor.unread_count.saturating_add(1);
            }
        }
        Ok(())
    }

    /// Newest-first page of messages strictly older than `before`
    /// (a `(created_at micros, seq)` pair). Returns the key to resume from,
    /// or `None` when the log is exhausted. Because the log is append-only
    /// and keys only grow, resuming from a key never duplicates or skips a
    /// message that existed when paging began.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        before: Option<(i64, u64)>,
        limit: usize,
    ) -> AppResult<(Vec<Message>, Option<(i64, u64)>)> {
        let handle = self.handle(conversation_id).await?;
        let state = handle.lock().await;

        let mut page = Vec::with_capacity(limit);
        let mut iter = state.log.iter().rev().skip_while(|m| match before {
            Some(key) => (m.created_at.timestamp_micros(), m.seq) >= key,
            None => false,
        });
        for message in iter.by_ref() {
            page.push(message.clone());
            if page.len() == limit {
                break;
            }
        }
        let next = if iter.next().is_some() {
            page.last()
                .map(|m| (m.created_at.timestamp_micros(), m.seq))
        } else {
            None
        };
        Ok((page, next))
    }

    pub async fn conversation_of(&self, message_id: Uuid) -> AppResult<Uuid> {
        self.message_index
            .read()
            .await
            .get(&message_id)
            .copied()
            .ok_or(AppError::NotFound("message"))
    }

    /// Whole-conversation read: stamps the participant's receipt on the
    /// named message (idempotent; the first stamp wins), advances the cursor
    /// and zeroes the unread count. Serialized with appends on the same
    /// conversation, so a concurrent append either lands before the reset
    /// (and is cleared) or after it (and counts as unread).
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<(ReadCursor, DateTime<Utc>)> {
        let handle = self.handle(conversation_id).await?;
        let mut state = handle.lock().await;
        let state = &mut *state;

        if !state.cursors.contains_key(&user_id) {
            return Err(AppError::NotFound("cursor"));
        }
        let now = Utc::now();
        let Some(message) = state.log.iter_mut().find(|m| m.id == message_id) else {
            return Err(AppError::NotFound("message"));
        };
        let receipt = message.read_by.entry(user_id).or_insert(ReadReceipt {
            delivered_at: now,
            read_at: now,
        });
        let read_at = receipt.read_at;

        let Some(cursor) = state.cursors.get_mut(&user_id) else {
            return Err(AppError::NotFound("cursor"));
        };
        cursor.last_read_message_id = Some(message_id);
        cursor.unread_count = 0;
        Ok((cursor.clone(), read_at))
    }

    pub async fn cursor(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadCursor> {
        let handle = self.handle(conversation_id).await?;
        let state = handle.lock().await;
        state
            .cursors
            .get(&user_id)
            .cloned()
            .ok_or(AppError::NotFound("cursor"))
    }

    pub async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        Ok(self.cursor(conversation_id, user_id).await?.unread_count)
    }
}
