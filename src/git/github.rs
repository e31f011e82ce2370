//! Pull requests through the `gh` CLI

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{info, warn};

use super::{positional, run_cli, GitError};

const PR_FIELDS: &str = "number,title,url,state,headRefName,baseRefName,body,createdAt,author";

/// Diffs returned by `view_pr` are cut to this many bytes
const MAX_PR_DIFF_BYTES: usize = 30 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PrAuthor {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrInfo {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: String,
    #[serde(rename = "headRefName")]
    pub head_ref: String,
    #[serde(rename = "baseRefName")]
    pub base_ref: String,
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub author: Option<PrAuthor>,
}

/// `#N: title`, URL, state and branch flow, one per line
pub fn format_pr(pr: &PrInfo) -> String {
    format!(
        "#{}: {}\nURL: {}\nState: {}\nBranch: {} → {}\n",
        pr.number, pr.title, pr.url, pr.state, pr.head_ref, pr.base_ref
    )
}

pub struct GitHub {
    repo: PathBuf,
    token: Option<String>,
}

impl GitHub {
    /// `token` is exported as `GH_TOKEN` when present.
    pub fn new(repo: impl Into<PathBuf>, token: Option<String>) -> Self {
        Self {
            repo: repo.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    async fn gh(&self, args: &[&str]) -> Result<String, GitError> {
        match &self.token {
            Some(token) => run_cli("gh", args, &self.repo, &[("GH_TOKEN", token.as_str())]).await,
            None => run_cli("gh", args, &self.repo, &[]).await,
        }
    }

    pub async fn create_pr(
        &self,
        title: &str,
        body: &str,
        base: Option<&str>,
        draft: bool,
    ) -> Result<PrInfo, GitError> {
        let mut args = vec!["pr", "create", "--title", title, "--body", body];
        if let Some(b) = base.filter(|b| !b.is_empty()) {
            args.extend(["--base", b]);
        }
        if draft {
            args.push("--draft");
        }

        let url = self.gh(&args).await?.trim().to_string();
        info!(url = %url, "created pull request");

        // gh prints the new PR's URL; details are best effort
        match self.get_pr(&url).await {
            Ok(pr) => Ok(pr),
            Err(e) => {
                warn!(error = %e, url = %url, "could not fetch created PR details");
                Ok(PrInfo {
                    url,
                    title: "PR Created".to_string(),
                    ..PrInfo::default()
                })
            }
        }
    }

    /// `reference` is a PR number or URL
    pub async fn get_pr(&self, reference: &str) -> Result<PrInfo, GitError> {
        let reference = positional(reference)?;
        let output = self.gh(&["pr", "view", reference, "--json", PR_FIELDS]).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Details, description and (truncated) diff of a PR, for review
    pub async fn view_pr(&self, reference: &str) -> Result<String, GitError> {
        let pr = self.get_pr(reference).await?;
        let mut out = format_pr(&pr);

        if let Some(author) = pr.author.as_ref().filter(|a| !a.login.is_empty()) {
            out.push_str(&format!("Author: {}\n", author.login));
        }
        if !pr.body.trim().is_empty() {
            out.push_str(&format!("\n{}\n", pr.body.trim()));
        }

        match self.gh(&["pr", "diff", positional(reference)?]).await {
            Ok(diff) => {
                out.push_str("\nDiff:\n");
                out.push_str(truncate_at_char(&diff, MAX_PR_DIFF_BYTES));
                if diff.len() > MAX_PR_DIFF_BYTES {
                    out.push_str("\n[Diff truncated]\n");
                }
            }
            Err(e) => warn!(error = %e, "could not fetch PR diff"),
        }

        Ok(out)
    }
}

fn truncate_at_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
