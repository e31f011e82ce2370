//! System prompt assembly

use std::path::Path;

use tracing::debug;

/// Guidelines beyond this many characters are cut at a section break
pub const MAX_GUIDELINES_CHARS: usize = 20_000;

const GUIDELINE_CANDIDATES: &[&str] = &[
    "CLAUDE.md",
    "claude.md",
    "CONTRIBUTING.md",
    "contributing.md",
    ".github/CONTRIBUTING.md",
];

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are devbot, an experienced software engineer working inside a team chat.

## Your Role
You help the team review code, debug failures, implement features and explain the codebase. You have direct access to the repository and can:
- Read and search code
- Write and edit files
- Run builds and tests
- Create branches, commits, and pull requests

## Guidelines

### Communication Style
- Be concise and direct; this is a chat, not a document
- Use code blocks with language hints for code snippets
- Ask clarifying questions when requirements are ambiguous

### Code Quality
- Follow the project's existing conventions and patterns
- Add tests for new functionality
- Don't introduce security vulnerabilities

### Git Workflow
- Create descriptive branch names (e.g., feature/add-user-validation)
- Write commit messages that explain the change
- Never force push or push directly to main/master
- Create PRs with proper descriptions

### Tool Usage
- Read files before modifying them
- Search for related code before making changes
- Run tests after making changes
- Check git status before committing

### Safety
- Never expose secrets, tokens, or credentials
- Don't delete files without explicit confirmation
- Some shell commands are refused by policy; when a command is rejected, use a dedicated tool or ask the user instead of working around it

## When Uncertain
Say so. Explain your assumptions and propose options for the user to choose from.
"#;

/// Default prompt plus the repository's guidelines, if it has any.
///
/// `guidelines_file` is tried first, then the usual contributor-guide names.
pub fn load_system_prompt(repo: &Path, guidelines_file: Option<&str>) -> String {
    let mut prompt = DEFAULT_SYSTEM_PROMPT.to_string();

    if let Some(guidelines) = load_guidelines(repo, guidelines_file) {
        prompt.push_str("\n\n## Project Guidelines\n\n");
        prompt.push_str("The following are project-specific guidelines from the repository:\n\n");
        prompt.push_str(&truncate_guidelines(&guidelines, MAX_GUIDELINES_CHARS));
    }

    prompt
}

fn load_guidelines(repo: &Path, guidelines_file: Option<&str>) -> Option<String> {
    guidelines_file
        .filter(|f| !f.is_empty())
        .into_iter()
        .chain(GUIDELINE_CANDIDATES.iter().copied())
        .find_map(|name| {
            let content = std::fs::read_to_string(repo.join(name)).ok()?;
            if content.trim().is_empty() {
                return None;
            }
            debug!(file = name, "loaded project guidelines");
            Some(content)
        })
}

/// Cut `content` to at most `max_chars` characters, preferring the last
/// paragraph break in the second half of the budget.
pub fn truncate_guidelines(content: &str, max_chars: usize) -> String {
    let end = match content.char_indices().nth(max_chars) {
        Some((byte, _)) => byte,
        None => return content.to_string(),
    };

    let mut truncated = &content[..end];
    if let Some(idx) = truncated.rfind("\n\n") {
        if truncated[..idx].chars().count() > max_chars / 2 {
            truncated = &truncated[..idx];
        }
    }

    format!("{}\n\n[Guidelines truncated due to length...]", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_guidelines_untouched() {
        assert_eq!(truncate_guidelines("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_at_section_break() {
        let content = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let out = truncate_guidelines(&content, 100);
        assert_eq!(out, format!("{}\n\n[Guidelines truncated due to length...]", "a".repeat(80)));
    }

    #[test]
    fn test_truncate_ignores_early_break() {
        let content = format!("{}\n\n{}", "a".repeat(10), "b".repeat(200));
        let out = truncate_guidelines(&content, 100);
        assert!(out.starts_with(&"a".repeat(10)));
        assert_eq!(out.chars().filter(|c| *c == 'b').count(), 88);
    }

    #[test]
    fn test_load_prefers_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CLAUDE.md"), "claude rules").unwrap();
        std::fs::write(dir.path().join("TEAM.md"), "team rules").unwrap();

        let prompt = load_system_prompt(dir.path(), Some("TEAM.md"));
        assert!(prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(prompt.contains("## Project Guidelines"));
        assert!(prompt.ends_with("team rules"));

        let fallback = load_system_prompt(dir.path(), Some("MISSING.md"));
        assert!(fallback.ends_with("claude rules"));
    }

    #[test]
    fn test_load_nested_contributing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".github")).unwrap();
        std::fs::write(dir.path().join(".github/CONTRIBUTING.md"), "be kind").unwrap();
        assert!(load_system_prompt(dir.path(), None).ends_with("be kind"));
    }

    #[test]
    fn test_no_guidelines() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_system_prompt(dir.path(), None), DEFAULT_SYSTEM_PROMPT);
    }
}
