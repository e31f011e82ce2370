//! Model backend integration
//!
//! This module provides the message types exchanged with the model and a
//! Messages API client behind the [`ModelBackend`] trait.

pub mod client;
pub mod types;

pub use client::{AnthropicClient, ChatError, ModelBackend};
pub use types::{
    ChatMessage, ContentBlock, ModelResponse, Role, StopReason, ToolDefinition, ToolInvocation,
    ToolResult,
};
