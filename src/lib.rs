//! devbot - agentic execution control plane for a chat-driven engineering bot
//!
//! A model proposes actions against a git repository; this library decides
//! which of them may run, runs them, and carries the conversation between
//! turns.
//!
//! # Modules
//!
//! - `security` - command validation and input sanitization
//! - `executor` - bounded shell execution and build/test output analysis
//! - `tools` - tool catalog, registry and dispatcher
//! - `agent` - the model/tool loop and system prompt
//! - `storage` - conversation store
//! - `llm` - model backend trait and Messages API client
//! - `codebase` / `git` - repository collaborators behind the tools
//! - `workspace` - local checkout or sandbox clone
//! - `config`, `metrics`, `tracing` - runtime settings and observability
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use devbot::{AgentConfig, AgentController, AnthropicClient, MemoryStore, Toolbox};
//!
//! let dispatcher = Arc::new(Toolbox::for_repo("/srv/checkout").dispatcher()?);
//! let backend = Arc::new(AnthropicClient::new(base_url, api_key, model, 8192));
//! let agent = AgentController::new(backend, Arc::new(MemoryStore::new()), dispatcher, AgentConfig::default());
//!
//! let result = agent.process_message("thread-1", "C123", "why does the build fail?", &cancel).await?;
//! ```

pub mod agent;
pub mod codebase;
pub mod config;
pub mod executor;
pub mod git;
pub mod llm;
pub mod metrics;
pub mod security;
pub mod storage;
pub mod tools;
pub mod tracing;
pub mod workspace;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentController, AgentError, AgentResult};
pub use config::Config;
pub use llm::{AnthropicClient, ModelBackend};
pub use security::{CommandPolicy, CommandValidator, Verdict};
pub use storage::{ConversationStore, MemoryStore};
pub use tools::{ToolDispatcher, Toolbox};
pub use workspace::RepoWorkspace;
