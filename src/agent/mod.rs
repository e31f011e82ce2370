//! Agent module for model-driven repository work
//!
//! # Architecture
//!
//! ```text
//! User message → AgentController ── store.get(id) → history
//!                     │                store.add_message(user)
//!                     ↓
//!              ModelBackend::complete(system, history, catalog)
//!                     ↓
//!              tool_use? ── no ──→ Done: store.add_message(assistant)
//!                     │ yes
//!                     ↓
//!              ToolDispatcher (sequential, in listed order)
//!                     ↓
//!              tool results → history → next iteration
//!                     ⋮
//!              iteration ceiling → IterationLimitExceeded
//! ```

pub mod controller;
pub mod prompts;

pub use controller::{AgentConfig, AgentController, AgentError, AgentResult};
pub use prompts::{load_system_prompt, truncate_guidelines, DEFAULT_SYSTEM_PROMPT};
