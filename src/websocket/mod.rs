use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

pub mod events;
pub mod handlers;

use events::WsEvent;

struct Subscriber {
    id: u64,
    user_id: Uuid,
    tx: mpsc::Sender<WsEvent>,
}

/// A live subscription to one conversation. Dropping the receiver (or
/// letting its bounded buffer overflow) detaches the subscriber; it must
/// re-subscribe and catch up via ListMessages.
pub struct Subscription {
    pub id: u64,
    pub conversation_id: Uuid,
    pub receiver: mpsc::Receiver<WsEvent>,
}

/// Fan-out dispatcher: per-conversation sets of bounded delivery channels,
/// one per live client connection. Push is a latency optimization, never the
/// system of record; subscriptions are not persisted.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<Subscriber>>>>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
}

impl ConnectionRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            buffer,
        }
    }

    pub async fn subscribe(&self, conversation_id: Uuid, user_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .write()
            .await
            .entry(conversation_id)
            .or_default()
            .push(Subscriber { id, user_id, tx });
        Subscription {
            id,
            conversation_id,
            receiver: rx,
        }
    }

    /// Idempotent; a second unsubscribe for the same id is a no-op.
    pub async fn unsubscribe(&self, conversation_id: Uuid, subscription_id: u64) {
        let mut guard = self.inner.write().await;
        let mut empty = false;
        if let Some(list) = guard.get_mut(&conversation_id) {
            list.retain(|s| s.id != subscription_id);
            empty = list.is_empty();
        }
        if empty {
            guard.remove(&conversation_id);
        }
    }

    /// Pushes `event` to every subscriber of the conversation except those
    /// belonging to `skip_user`, in submission order. Uses `try_send` so a
    /// slow subscriber can never backpressure the append path: a full buffer
    /// drops that subscriber, which then falls back to polling. Returns the
    /// number of subscribers the frame was queued for.
    pub async fn broadcast(
        &self,
        conversation_id: Uuid,
        event: WsEvent,
        skip_user: Option<Uuid>,
    ) -> usize {
        let mut guard = self.inner.write().await;
        let mut delivered = 0;
        let mut empty = false;
        if let Some(list) = guard.get_mut(&conversation_id) {
            list.retain(|s| {
                if skip_user == Some(s.user_id) {
                    return true;
                }
                match s.tx.try_send(event.clone()) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            conversation_id = %conversation_id,
                            subscription_id = s.id,
                            "subscriber buffer full, dropping connection"
                        );
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                }
            });
            empty = list.is_empty();
        }
        if empty {
            guard.remove(&conversation_id);
        }
        delivered
    }

    pub async fn subscriber_count(&self, conversation_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .get(&conversation_id)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}
