//! Local git operations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::{positional, run_cli, GitError};
use crate::security::{sanitize_branch_name, sanitize_commit_message, CommandValidator};

/// `git log` rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Oneline,
    Short,
    Medium,
    Full,
}

impl LogFormat {
    /// Unknown names fall back to `Oneline`
    pub fn parse(name: &str) -> Self {
        match name {
            "short" => LogFormat::Short,
            "medium" => LogFormat::Medium,
            "full" => LogFormat::Full,
            _ => LogFormat::Oneline,
        }
    }

    fn flag(self) -> &'static str {
        match self {
            LogFormat::Oneline => "--oneline",
            LogFormat::Short => "--format=short",
            LogFormat::Medium => "--format=medium",
            LogFormat::Full => "--format=full",
        }
    }
}

/// Git commands against one working tree
#[derive(Clone)]
pub struct GitOps {
    repo: PathBuf,
    validator: Arc<CommandValidator>,
}

impl GitOps {
    /// `validator` vets pushes against the git policy before they run.
    pub fn new(repo: impl Into<PathBuf>, validator: Arc<CommandValidator>) -> Self {
        Self {
            repo: repo.into(),
            validator,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        run_cli("git", args, &self.repo, &[]).await
    }

    pub async fn status(&self) -> Result<String, GitError> {
        self.git(&["status", "--short", "--branch"]).await
    }

    pub async fn diff(
        &self,
        staged: bool,
        reference: Option<&str>,
        path: Option<&str>,
    ) -> Result<String, GitError> {
        let mut args = vec!["diff"];
        if staged {
            args.push("--cached");
        }
        if let Some(r) = reference.filter(|r| !r.trim().is_empty()) {
            args.push(positional(r)?);
        }
        if let Some(p) = path.filter(|p| !p.is_empty()) {
            args.extend(["--", p]);
        }
        self.git(&args).await
    }

    /// Last `count` commits (default 10), optionally limited to `path`
    pub async fn log(
        &self,
        count: Option<usize>,
        path: Option<&str>,
        format: LogFormat,
    ) -> Result<String, GitError> {
        let count = format!("-n{}", count.filter(|c| *c > 0).unwrap_or(10));
        let mut args = vec!["log", count.as_str(), format.flag()];
        if let Some(p) = path.filter(|p| !p.is_empty()) {
            args.extend(["--", p]);
        }
        self.git(&args).await
    }

    /// Create and switch to a branch. Returns the sanitized name actually used.
    pub async fn create_branch(&self, name: &str, from: Option<&str>) -> Result<String, GitError> {
        let branch = sanitize_branch_name(name);
        if branch.is_empty() {
            return Err(GitError::InvalidBranchName);
        }
        let from = from.filter(|b| !b.trim().is_empty()).map(positional).transpose()?;

        let mut args = vec!["checkout", "-b", branch.as_str()];
        if let Some(base) = from {
            args.push(base);
        }
        self.git(&args).await?;

        info!(branch = %branch, "created branch");
        Ok(branch)
    }

    /// Stage `files` (everything when empty) and commit.
    /// Returns the sanitized message.
    pub async fn commit(&self, message: &str, files: &[String]) -> Result<String, GitError> {
        let message = sanitize_commit_message(message);
        if message.trim().is_empty() {
            return Err(GitError::EmptyCommitMessage);
        }

        if files.is_empty() {
            self.git(&["add", "-A"]).await?;
        } else {
            let mut args = vec!["add", "--"];
            args.extend(files.iter().map(String::as_str));
            self.git(&args).await?;
        }

        self.git(&["commit", "-m", message.as_str()]).await?;
        info!(message = %message, "created commit");
        Ok(message)
    }

    /// Push the current branch. Returns the branch name.
    pub async fn push(&self, set_upstream: bool) -> Result<String, GitError> {
        let branch = self.current_branch().await?;

        let args: Vec<&str> = if set_upstream {
            vec!["push", "-u", "origin", branch.as_str()]
        } else {
            vec!["push", "origin", branch.as_str()]
        };

        let verdict = self.validator.validate(&format!("git {}", args.join(" ")));
        if !verdict.allowed {
            return Err(GitError::Rejected(verdict.reason));
        }

        self.git(&args).await?;
        info!(branch = %branch, set_upstream, "pushed branch");
        Ok(branch)
    }

    pub async fn current_branch(&self) -> Result<String, GitError> {
        Ok(self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?.trim().to_string())
    }

    /// Remote default branch, falling back to checking `main` then `master`
    pub async fn default_branch(&self) -> String {
        remote_default_branch(&self.repo).await
    }

    pub async fn fetch(&self) -> Result<(), GitError> {
        self.git(&["fetch", "--all"]).await.map(|_| ())
    }

    pub async fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        Ok(!self.git(&["status", "--porcelain"]).await?.trim().is_empty())
    }
}

/// Default branch of `origin` for the checkout at `repo`
pub(crate) async fn remote_default_branch(repo: &Path) -> String {
    if let Ok(head) = run_cli("git", &["symbolic-ref", "refs/remotes/origin/HEAD", "--short"], repo, &[]).await {
        let head = head.trim();
        return head.strip_prefix("origin/").unwrap_or(head).to_string();
    }
    for candidate in ["main", "master"] {
        let reference = format!("refs/remotes/origin/{}", candidate);
        if run_cli("git", &["show-ref", "--verify", "--quiet", reference.as_str()], repo, &[])
            .await
            .is_ok()
        {
            return candidate.to_string();
        }
    }
    "main".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q", "-b", "feature-start"],
            vec!["config", "user.email", "dev@example.com"],
            vec!["config", "user.name", "Dev"],
        ] {
            run_cli("git", &args, dir, &[]).await.unwrap();
        }
    }

    fn ops(dir: &Path) -> GitOps {
        GitOps::new(dir, Arc::new(CommandValidator::default()))
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("full"), LogFormat::Full);
        assert_eq!(LogFormat::parse("bogus"), LogFormat::Oneline);
        assert_eq!(LogFormat::default().flag(), "--oneline");
    }

    #[tokio::test]
    async fn test_branch_commit_and_log() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let git = ops(dir.path());

        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        assert!(git.has_uncommitted_changes().await.unwrap());

        let msg = git.commit("add `a` for $HOME", &[]).await.unwrap();
        assert_eq!(msg, "add 'a' for HOME");
        assert!(!git.has_uncommitted_changes().await.unwrap());

        let branch = git.create_branch("fix: the bug?", None).await.unwrap();
        assert_eq!(branch, "fix--the-bug");
        assert_eq!(git.current_branch().await.unwrap(), "fix--the-bug");

        let log = git.log(Some(5), None, LogFormat::Oneline).await.unwrap();
        assert!(log.contains("add 'a' for HOME"));

        let status = git.status().await.unwrap();
        assert!(status.starts_with("## fix--the-bug"));

        // no remote configured
        assert_eq!(git.default_branch().await, "main");
    }

    #[tokio::test]
    async fn test_invalid_branch_and_empty_message() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let git = ops(dir.path());

        assert!(matches!(
            git.create_branch("..", None).await,
            Err(GitError::InvalidBranchName)
        ));
        assert!(matches!(git.commit("$$", &[]).await, Err(GitError::EmptyCommitMessage)));
    }

    #[tokio::test]
    async fn test_option_like_refs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo).await;
        let git = ops(&repo);
        std::fs::write(repo.join("a.txt"), "hello").unwrap();
        git.commit("init", &[]).await.unwrap();

        let err = git
            .diff(false, Some("--output=../escaped.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::InvalidRef(_)));
        assert!(!dir.path().join("escaped.txt").exists());

        assert!(matches!(
            git.create_branch("topic", Some("-f")).await,
            Err(GitError::InvalidRef(_))
        ));
        assert_eq!(git.current_branch().await.unwrap(), "feature-start");
    }

    #[tokio::test]
    async fn test_git_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let err = ops(dir.path()).diff(false, Some("no-such-ref"), None).await.unwrap_err();
        assert!(matches!(err, GitError::Failed { program: "git", .. }));
    }
}
