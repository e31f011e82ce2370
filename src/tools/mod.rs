//! Tool dispatch
//!
//! Maps a model-issued tool name plus JSON arguments onto one collaborator
//! operation and folds the outcome into a uniform [`ToolResult`].
//!
//! ```text
//! ToolInvocation { name, arguments }
//!        ↓
//! ToolDispatcher ── registry lookup (verified against the catalog at startup)
//!        ↓
//! ToolHandler::call ── codebase / runner / git / forge / analyzer
//!        ↓
//! ToolResult { output, is_error }
//! ```
//!
//! [`ToolResult`]: crate::llm::ToolResult

pub mod catalog;
pub mod codebase;
pub mod dispatcher;
pub mod shell;
pub mod vcs;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::codebase::{CodeSearcher, CodebaseError, FileReader, FileWriter, RepoRoot};
use crate::executor::{CommandRunner, RunnerError};
use crate::git::{GitError, GitHub, GitOps};
use crate::security::CommandValidator;

pub use catalog::tool_catalog;
pub use dispatcher::{RegistryError, ToolDispatcher, ToolRegistry};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Codebase(#[from] CodebaseError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("tool task failed: {0}")]
    TaskFailed(String),
    #[error("cancelled")]
    Cancelled,
}

/// Per-invocation context handed to every handler
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub cancel: CancellationToken,
    pub trace_id: String,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, trace_id: impl Into<String>) -> Self {
        Self {
            cancel,
            trace_id: trace_id.into(),
        }
    }
}

/// One tool operation
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Decode handler arguments. A missing argument object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Everything the built-in tools operate on
#[derive(Clone)]
pub struct Toolbox {
    pub root: RepoRoot,
    pub validator: Arc<CommandValidator>,
    pub runner: Arc<CommandRunner>,
    pub git: Arc<GitOps>,
    pub github: Arc<GitHub>,
    pub build_cmd: String,
    pub test_cmd: String,
    pub guidelines_file: String,
    pub command_timeout: Duration,
}

impl Toolbox {
    /// Collaborators for the repository at `repo`, with default policy and
    /// limits.
    pub fn for_repo(repo: impl Into<PathBuf>) -> Self {
        let repo = repo.into();
        let validator = Arc::new(CommandValidator::default());
        Self {
            root: RepoRoot::new(&repo),
            runner: Arc::new(CommandRunner::new(&repo)),
            git: Arc::new(GitOps::new(&repo, validator.clone())),
            github: Arc::new(GitHub::new(&repo, None)),
            validator,
            build_cmd: "./build.sh build".to_string(),
            test_cmd: "./build.sh test".to_string(),
            guidelines_file: "CLAUDE.md".to_string(),
            command_timeout: crate::executor::DEFAULT_TIMEOUT,
        }
    }

    pub(crate) fn reader(&self) -> FileReader {
        FileReader::new(self.root.clone())
    }

    pub(crate) fn writer(&self) -> FileWriter {
        FileWriter::new(self.root.clone())
    }

    pub(crate) fn searcher(&self) -> CodeSearcher {
        CodeSearcher::new(self.root.clone())
    }

    /// Registry with one handler per catalog entry
    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        codebase::register(&mut registry, self);
        shell::register(&mut registry, self);
        vcs::register(&mut registry, self);
        registry
    }

    /// Dispatcher over [`Self::registry`] checked against the full catalog
    pub fn dispatcher(&self) -> Result<ToolDispatcher, RegistryError> {
        ToolDispatcher::new(self.registry(), tool_catalog(self.validator.allowed_commands()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        path: String,
        #[serde(default)]
        count: Option<usize>,
    }

    #[test]
    fn test_parse_args() {
        let args: Args = parse_args(json!({"path": "a.rs"})).unwrap();
        assert_eq!(args.path, "a.rs");
        assert!(args.count.is_none());

        let err = parse_args::<Args>(json!({"count": 3})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_null_args_are_empty_object() {
        #[derive(Deserialize)]
        struct NoArgs {}
        assert!(parse_args::<NoArgs>(Value::Null).is_ok());
    }

    #[test]
    fn test_toolbox_registry_matches_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let toolbox = Toolbox::for_repo(dir.path());
        let dispatcher = toolbox.dispatcher().unwrap();
        assert_eq!(dispatcher.catalog().len(), 20);
    }
}
