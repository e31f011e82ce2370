//! Version control and forge wrappers
//!
//! Thin argument builders around the `git` and `gh` CLIs. Arguments are
//! passed as argv, never through a shell, so branch names and commit
//! messages cannot inject commands.

pub mod github;
pub mod operations;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

pub use github::{format_pr, GitHub, PrAuthor, PrInfo};
pub use operations::{GitOps, LogFormat};

/// Upper bound on any single git/gh invocation
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} command timed out")]
    Timeout { program: &'static str },
    #[error("{program} {args} failed: {stderr}")]
    Failed {
        program: &'static str,
        args: String,
        stderr: String,
    },
    #[error("invalid branch name")]
    InvalidBranchName,
    #[error("empty commit message")]
    EmptyCommitMessage,
    #[error("{0}")]
    Rejected(String),
    #[error("invalid reference {0:?}: must not start with '-'")]
    InvalidRef(String),
    #[error("failed to parse PR info: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Positional argument that git/gh must not read as an option
pub(crate) fn positional(value: &str) -> Result<&str, GitError> {
    let value = value.trim();
    if value.starts_with('-') {
        return Err(GitError::InvalidRef(value.to_string()));
    }
    Ok(value)
}

/// Run a CLI in `dir` and return its stdout.
pub(crate) async fn run_cli(
    program: &'static str,
    args: &[&str],
    dir: &Path,
    env: &[(&str, &str)],
) -> Result<String, GitError> {
    debug!(program, args = %args.join(" "), "running vcs command");

    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir).kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = match tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await {
        Ok(result) => result.map_err(|source| GitError::Spawn { program, source })?,
        Err(_) => return Err(GitError::Timeout { program }),
    };

    if !output.status.success() {
        return Err(GitError::Failed {
            program,
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
