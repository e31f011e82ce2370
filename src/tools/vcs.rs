//! Git and pull request tools

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, ToolContext, ToolError, ToolHandler, ToolRegistry, Toolbox};
use crate::git::{format_pr, GitHub, GitOps, LogFormat};

pub(super) fn register(registry: &mut ToolRegistry, toolbox: &Toolbox) {
    let git = toolbox.git.clone();
    let github = toolbox.github.clone();

    registry.register("git_status", Arc::new(GitStatus(git.clone())));
    registry.register("git_diff", Arc::new(GitDiff(git.clone())));
    registry.register("git_log", Arc::new(GitLog(git.clone())));
    registry.register("create_branch", Arc::new(CreateBranch(git.clone())));
    registry.register("commit", Arc::new(Commit(git.clone())));
    registry.register("push", Arc::new(Push(git)));
    registry.register("create_pr", Arc::new(CreatePr(github.clone())));
    registry.register("get_pr", Arc::new(GetPr(github)));
}

fn or_placeholder(output: String, placeholder: &str) -> String {
    if output.trim().is_empty() {
        placeholder.to_string()
    } else {
        output
    }
}

struct GitStatus(Arc<GitOps>);

#[async_trait]
impl ToolHandler for GitStatus {
    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok(self.0.status().await?)
    }
}

struct GitDiff(Arc<GitOps>);

#[derive(Deserialize)]
struct GitDiffArgs {
    #[serde(default)]
    staged: bool,
    #[serde(rename = "ref")]
    reference: Option<String>,
    path: Option<String>,
}

#[async_trait]
impl ToolHandler for GitDiff {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: GitDiffArgs = parse_args(args)?;
        let diff = self
            .0
            .diff(args.staged, args.reference.as_deref(), args.path.as_deref())
            .await?;
        Ok(or_placeholder(diff, "No changes"))
    }
}

struct GitLog(Arc<GitOps>);

#[derive(Deserialize)]
struct GitLogArgs {
    count: Option<usize>,
    path: Option<String>,
    format: Option<String>,
}

#[async_trait]
impl ToolHandler for GitLog {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: GitLogArgs = parse_args(args)?;
        let format = args.format.as_deref().map(LogFormat::parse).unwrap_or_default();
        let log = self.0.log(args.count, args.path.as_deref(), format).await?;
        Ok(or_placeholder(log, "No commits"))
    }
}

struct CreateBranch(Arc<GitOps>);

#[derive(Deserialize)]
struct CreateBranchArgs {
    name: String,
    from: Option<String>,
}

#[async_trait]
impl ToolHandler for CreateBranch {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: CreateBranchArgs = parse_args(args)?;
        let branch = self.0.create_branch(&args.name, args.from.as_deref()).await?;
        Ok(format!("Created and switched to branch: {}", branch))
    }
}

struct Commit(Arc<GitOps>);

#[derive(Deserialize)]
struct CommitArgs {
    message: String,
    #[serde(default)]
    files: Vec<String>,
}

#[async_trait]
impl ToolHandler for Commit {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: CommitArgs = parse_args(args)?;
        let message = self.0.commit(&args.message, &args.files).await?;
        Ok(format!("Committed: {}", message))
    }
}

struct Push(Arc<GitOps>);

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct PushArgs {
    #[serde(default = "default_true")]
    set_upstream: bool,
}

#[async_trait]
impl ToolHandler for Push {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: PushArgs = parse_args(args)?;
        let branch = self.0.push(args.set_upstream).await?;
        Ok(format!("Pushed branch: {}", branch))
    }
}

struct CreatePr(Arc<GitHub>);

#[derive(Deserialize)]
struct CreatePrArgs {
    title: String,
    body: String,
    base: Option<String>,
    #[serde(default)]
    draft: bool,
}

#[async_trait]
impl ToolHandler for CreatePr {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: CreatePrArgs = parse_args(args)?;
        let pr = self
            .0
            .create_pr(&args.title, &args.body, args.base.as_deref(), args.draft)
            .await?;
        Ok(format_pr(&pr))
    }
}

struct GetPr(Arc<GitHub>);

#[derive(Deserialize)]
struct GetPrArgs {
    url: String,
}

#[async_trait]
impl ToolHandler for GetPr {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: GetPrArgs = parse_args(args)?;
        Ok(self.0.view_pr(&args.url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitError;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    async fn git(dir: &std::path::Path, args: &[&str]) {
        let status = tokio::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .await
            .unwrap();
        assert!(status.success());
    }

    async fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]).await;
        git(dir.path(), &["config", "user.email", "dev@example.com"]).await;
        git(dir.path(), &["config", "user.name", "Dev"]).await;
        std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        git(dir.path(), &["add", "-A"]).await;
        git(dir.path(), &["commit", "-q", "-m", "initial"]).await;
        dir
    }

    fn ctx() -> ToolContext {
        ToolContext::new(CancellationToken::new(), "t")
    }

    #[tokio::test]
    async fn test_git_diff_refuses_option_refs() {
        let dir = repo().await;
        let d = Toolbox::for_repo(dir.path()).dispatcher().unwrap();

        let err = d
            .execute("git_diff", json!({"ref": "--output=escaped.txt"}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Git(GitError::InvalidRef(_))));
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_push_defaults_to_upstream() {
        let args: PushArgs = parse_args(json!({})).unwrap();
        assert!(args.set_upstream);
        let args: PushArgs = parse_args(json!({"set_upstream": false})).unwrap();
        assert!(!args.set_upstream);
    }

    #[tokio::test]
    async fn test_branch_commit_diff_flow() {
        let dir = repo().await;
        let d = Toolbox::for_repo(dir.path()).dispatcher().unwrap();

        let out = d.execute("create_branch", json!({"name": "feature/add docs"}), &ctx()).await.unwrap();
        assert_eq!(out, "Created and switched to branch: feature/add-docs");

        assert_eq!(d.execute("git_diff", json!({}), &ctx()).await.unwrap(), "No changes");

        std::fs::write(dir.path().join("README.md"), "hello\nworld\n").unwrap();
        let diff = d.execute("git_diff", json!({"path": "README.md"}), &ctx()).await.unwrap();
        assert!(diff.contains("+world"));

        let out = d.execute("commit", json!({"message": "docs: add world"}), &ctx()).await.unwrap();
        assert_eq!(out, "Committed: docs: add world");

        let log = d.execute("git_log", json!({"count": 1}), &ctx()).await.unwrap();
        assert!(log.contains("docs: add world"));
    }

    #[tokio::test]
    async fn test_push_to_protected_branch_without_upstream_is_refused() {
        let dir = repo().await;
        let d = Toolbox::for_repo(dir.path()).dispatcher().unwrap();

        let err = d
            .execute("push", json!({"set_upstream": false}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Git(GitError::Rejected(_))));
    }
}
