//! In-memory conversation store

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Conversation, ConversationStore, Message, StoreError};
use crate::metrics::{CONVERSATIONS_ACTIVE, CONVERSATIONS_EXPIRED};

/// Conversation store backed by a `HashMap` behind one async `RwLock`.
///
/// Reads hand out clones, so callers never hold the lock across a model
/// call.
#[derive(Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn save(&self, conversation: Conversation) -> Result<(), StoreError> {
        if conversation.id.is_empty() {
            return Err(StoreError::InvalidId(conversation.id));
        }
        let mut map = self.conversations.write().await;
        map.insert(conversation.id.clone(), conversation);
        CONVERSATIONS_ACTIVE.set(map.len() as i64);
        Ok(())
    }

    async fn add_message(
        &self,
        id: &str,
        channel_ref: &str,
        message: Message,
    ) -> Result<(), StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        let mut map = self.conversations.write().await;
        let conversation = map
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id, channel_ref));
        conversation.messages.push(message);
        conversation.updated_at = Utc::now();
        CONVERSATIONS_ACTIVE.set(map.len() as i64);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut map = self.conversations.write().await;
        map.remove(id);
        CONVERSATIONS_ACTIVE.set(map.len() as i64);
        Ok(())
    }

    async fn cleanup(&self, older_than: Duration) -> Result<usize, StoreError> {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));

        let mut map = self.conversations.write().await;
        let before = map.len();
        if let Some(cutoff) = cutoff {
            map.retain(|_, conversation| conversation.updated_at >= cutoff);
        }
        let removed = before - map.len();

        CONVERSATIONS_ACTIVE.set(map.len() as i64);
        CONVERSATIONS_EXPIRED.inc_by(removed as u64);
        if removed > 0 {
            debug!(removed, remaining = map.len(), "expired conversations removed");
        }
        Ok(removed)
    }
}
