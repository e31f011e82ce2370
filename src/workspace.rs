//! Repository workspace
//!
//! Local mode works on an existing checkout. Sandbox mode keeps its own
//! clone of a GitHub repository inside the workspace directory and brings
//! it up to date with the remote default branch on startup.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::{Config, Mode};
use crate::git::operations::remote_default_branch;
use crate::git::{run_cli, GitError};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("repository path does not exist: {0}")]
    Missing(PathBuf),
    #[error("repository path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("not a git repository (missing .git): {0}")]
    NotARepository(PathBuf),
    #[error("{0} is required in {1} mode")]
    MissingSetting(&'static str, Mode),
    #[error("failed to prepare workspace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("git {action} failed: {message}")]
    Git { action: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub enum RepoWorkspace {
    Local {
        path: PathBuf,
    },
    Sandbox {
        github_repo: String,
        token: String,
        path: PathBuf,
    },
}

impl RepoWorkspace {
    pub fn from_config(config: &Config) -> Result<Self, WorkspaceError> {
        match config.mode {
            Mode::Local => {
                let path = config
                    .repo_path
                    .as_ref()
                    .ok_or(WorkspaceError::MissingSetting("REPO_PATH", Mode::Local))?;
                Ok(RepoWorkspace::Local {
                    path: absolute(path)?,
                })
            }
            Mode::Sandbox => {
                let github_repo = config
                    .github_repo
                    .clone()
                    .ok_or(WorkspaceError::MissingSetting("GITHUB_REPO", Mode::Sandbox))?;
                let token = config
                    .github_token
                    .clone()
                    .ok_or(WorkspaceError::MissingSetting("GITHUB_TOKEN", Mode::Sandbox))?;
                let path = absolute(&config.workspace_path)?.join(extract_repo_name(&github_repo));
                Ok(RepoWorkspace::Sandbox {
                    github_repo,
                    token,
                    path,
                })
            }
        }
    }

    /// Absolute path of the repository root
    pub fn repo_path(&self) -> &Path {
        match self {
            RepoWorkspace::Local { path } | RepoWorkspace::Sandbox { path, .. } => path,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            RepoWorkspace::Local { .. } => Mode::Local,
            RepoWorkspace::Sandbox { .. } => Mode::Sandbox,
        }
    }

    /// Validate the checkout (local) or clone/update it (sandbox).
    pub async fn ensure_ready(&self) -> Result<(), WorkspaceError> {
        match self {
            RepoWorkspace::Local { path } => check_checkout(path).await,
            RepoWorkspace::Sandbox {
                github_repo,
                token,
                path,
            } => {
                if tokio::fs::metadata(path.join(".git")).await.is_ok() {
                    return self.sync().await;
                }

                let workspace = path.parent().unwrap_or(path);
                tokio::fs::create_dir_all(workspace)
                    .await
                    .map_err(|source| WorkspaceError::Io {
                        path: workspace.to_path_buf(),
                        source,
                    })?;

                info!(repo = %github_repo, path = %path.display(), "cloning repository");
                let url = clone_url(github_repo, token);
                let target = path.to_string_lossy();
                run_cli("git", &["clone", url.as_str(), target.as_ref()], workspace, &[])
                    .await
                    .map_err(|e| git_failure("clone", e, token))?;
                Ok(())
            }
        }
    }

    /// Fetch from the remote. Sandbox clones are also moved onto the
    /// remote default branch.
    pub async fn sync(&self) -> Result<(), WorkspaceError> {
        let path = self.repo_path();
        let token = match self {
            RepoWorkspace::Sandbox { token, .. } => token.as_str(),
            RepoWorkspace::Local { .. } => "",
        };

        run_cli("git", &["fetch", "--all"], path, &[])
            .await
            .map_err(|e| git_failure("fetch", e, token))?;

        if let RepoWorkspace::Sandbox { .. } = self {
            let branch = remote_default_branch(path).await;
            info!(branch = %branch, "updating sandbox clone");
            run_cli("git", &["checkout", branch.as_str()], path, &[])
                .await
                .map_err(|e| git_failure("checkout", e, token))?;
            run_cli("git", &["pull", "--ff-only", "origin", branch.as_str()], path, &[])
                .await
                .map_err(|e| git_failure("pull", e, token))?;
        }
        Ok(())
    }
}

async fn check_checkout(path: &Path) -> Result<(), WorkspaceError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| WorkspaceError::Missing(path.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(WorkspaceError::NotADirectory(path.to_path_buf()));
    }
    if tokio::fs::metadata(path.join(".git")).await.is_err() {
        return Err(WorkspaceError::NotARepository(path.to_path_buf()));
    }
    Ok(())
}

/// Git errors echo their arguments, which may carry the token
fn git_failure(action: &'static str, err: GitError, token: &str) -> WorkspaceError {
    let message = err.to_string();
    let message = if token.is_empty() {
        message
    } else {
        message.replace(token, "***")
    };
    WorkspaceError::Git { action, message }
}

fn absolute(path: &Path) -> Result<PathBuf, WorkspaceError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Last path segment of a GitHub repository reference, without `.git`
pub fn extract_repo_name(github_repo: &str) -> String {
    let trimmed = strip_scheme(github_repo)
        .trim_start_matches("github.com/")
        .trim_start_matches("github.com:")
        .trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}

/// Authenticated HTTPS clone URL
pub fn clone_url(github_repo: &str, token: &str) -> String {
    let repo = strip_scheme(github_repo).replacen("github.com:", "github.com/", 1);
    let repo = if repo.contains('/') && !repo.starts_with("github.com/") && repo.matches('/').count() == 1 {
        format!("github.com/{}", repo)
    } else {
        repo
    };
    format!("https://{}@{}", token, repo)
}

fn strip_scheme(repo: &str) -> &str {
    repo.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("git@")
}
