use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::cursor::ReadCursor;
use crate::store::Store;

/// Per-participant read state over the backing store. Unread increments for
/// an accepted append are applied by the store inside the same transaction
/// as the conversation summary (`Store::apply_append_effects`), so badges
/// and conversation lists cannot drift apart.
pub struct ReadTracker;

impl ReadTracker {
    /// Whole-conversation read: marking any message read clears the
    /// participant's unread badge and advances the cursor to that message.
    /// Stamping the same receipt again is a no-op.
    pub async fn mark_read(
        store: &Store,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<(ReadCursor, DateTime<Utc>)> {
        store.mark_read(conversation_id, user_id, message_id).await
    }

    pub async fn cursor(
        store: &Store,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ReadCursor> {
        store.cursor(conversation_id, user_id).await
    }

    pub async fn unread_count(
        store: &Store,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<u64> {
        store.unread_count(conversation_id, user_id).await
    }
}
