//! Messages API wire types with tool-use content blocks

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation role. System text travels separately from the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types this client does not act on (e.g. thinking)
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(content)],
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(content)],
        }
    }

    /// Assistant turn rebuilt from a response: non-empty text and tool-use
    /// blocks in their original order, anything else dropped.
    pub fn assistant_blocks(blocks: &[ContentBlock]) -> Self {
        Self {
            role: Role::Assistant,
            content: blocks
                .iter()
                .filter(|b| match b {
                    ContentBlock::Text { text } => !text.is_empty(),
                    ContentBlock::ToolUse { .. } => true,
                    _ => false,
                })
                .cloned()
                .collect(),
        }
    }

    /// User turn bundling every tool result of one iteration
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::from).collect(),
        }
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }
}

/// A tool request extracted from a model response
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Outcome of one tool invocation, answered 1:1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub invocation_id: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(invocation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(invocation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            output: output.into(),
            is_error: true,
        }
    }
}

impl From<ToolResult> for ContentBlock {
    fn from(r: ToolResult) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: r.invocation_id,
            content: r.output,
            is_error: r.is_error,
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Response from the model backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
}

impl ModelResponse {
    /// Final-answer response with a single text block
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    pub fn text(&self) -> String {
        collect_text(&self.content)
    }

    /// Tool-use blocks in listed order
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// True only when the model stopped to use tools and named at least one.
    pub fn requests_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse)
            && self
                .content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

/// Tool definition for the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value, // JSON Schema
}

fn collect_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
