//! Conversation storage
//!
//! A conversation is the ordered user/assistant dialogue for one chat
//! thread. Only user turns and final assistant answers are stored; tool
//! round-trips live in the agent loop for the duration of one turn.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{ChatMessage, Role};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid conversation id {0:?}")]
    InvalidId(String),
}

/// One stored turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Replay as a model-facing message
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            Role::User => ChatMessage::user(self.content.clone()),
            Role::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Transport-side location of the thread (channel id, terminal session)
    pub channel_ref: String,
    /// Oldest first
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, channel_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            channel_ref: channel_ref.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Model-facing history, in order. Blank messages are skipped: the
    /// Messages API rejects empty text blocks.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(Message::to_chat_message)
            .collect()
    }
}

/// Keyed conversation log shared by every agent loop.
///
/// Every method is atomic with respect to a single conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// A copy of the conversation, if it exists
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Replace the stored conversation wholesale
    async fn save(&self, conversation: Conversation) -> Result<(), StoreError>;

    /// Append one message. Creates the conversation with `channel_ref` on
    /// first use.
    async fn add_message(
        &self,
        id: &str,
        channel_ref: &str,
        message: Message,
    ) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Remove conversations idle for longer than `older_than`; returns how
    /// many were removed.
    async fn cleanup(&self, older_than: Duration) -> Result<usize, StoreError>;
}
