//! Tool definitions presented to the model

use serde_json::{json, Map, Value};

use crate::llm::ToolDefinition;

fn tool(name: &str, description: impl Into<String>, properties: Value, required: &[&str]) -> ToolDefinition {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), properties);
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    ToolDefinition {
        name: name.to_string(),
        description: description.into(),
        input_schema: Value::Object(schema),
    }
}

fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn integer(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

fn boolean(description: &str) -> Value {
    json!({"type": "boolean", "description": description})
}

/// All built-in tools. `allowed_commands` is disclosed in the
/// `run_command` description so the model knows what it may run.
pub fn tool_catalog(allowed_commands: &[String]) -> Vec<ToolDefinition> {
    vec![
        // Code understanding
        tool(
            "read_file",
            "Read the contents of a file at the given path. Returns the file content as text.",
            json!({
                "path": string("The relative path to the file from the repository root"),
                "start_line": integer("Optional start line number (1-indexed). If provided, only returns lines from this point."),
                "end_line": integer("Optional end line number (1-indexed). If provided, only returns lines up to this point."),
            }),
            &["path"],
        ),
        tool(
            "list_files",
            "List files matching a glob pattern. Returns a list of file paths.",
            json!({
                "pattern": string("Glob pattern to match files (e.g., '**/*.java', 'src/**/*.go')"),
            }),
            &["pattern"],
        ),
        tool(
            "search_code",
            "Search for a pattern in the codebase using grep-like syntax. Returns matching lines with file paths and line numbers.",
            json!({
                "pattern": string("The search pattern (supports regex)"),
                "path": string("Optional path to limit search scope (can be a directory or glob pattern)"),
                "case_sensitive": boolean("Whether the search should be case-sensitive (default: false)"),
                "max_results": integer("Maximum number of results to return (default: 50)"),
            }),
            &["pattern"],
        ),
        tool(
            "get_tree",
            "Get the directory structure of the repository or a subdirectory.",
            json!({
                "path": string("The path to get the tree for (default: repository root)"),
                "max_depth": integer("Maximum depth to traverse (default: 3)"),
            }),
            &[],
        ),
        // Code modification
        tool(
            "write_file",
            "Write content to a file. Creates the file if it doesn't exist, or overwrites if it does.",
            json!({
                "path": string("The relative path to the file from the repository root"),
                "content": string("The content to write to the file"),
            }),
            &["path", "content"],
        ),
        tool(
            "edit_file",
            "Make a targeted edit to a file by finding and replacing specific text. Use this for surgical changes rather than rewriting entire files.",
            json!({
                "path": string("The relative path to the file from the repository root"),
                "old_text": string("The exact text to find and replace (must be unique in the file)"),
                "new_text": string("The text to replace old_text with"),
            }),
            &["path", "old_text", "new_text"],
        ),
        // Build and test
        tool(
            "run_command",
            format!(
                "Run a shell command in the repository directory. Only allowed commands: {}.",
                allowed_commands.join(", ")
            ),
            json!({
                "command": string("The command to run"),
            }),
            &["command"],
        ),
        tool(
            "run_build",
            "Run the project's build command (configured via DEVBOT_BUILD_CMD).",
            json!({
                "args": string("Optional additional arguments to pass to the build command"),
            }),
            &[],
        ),
        tool(
            "run_tests",
            "Run the project's test command (configured via DEVBOT_TEST_CMD).",
            json!({
                "args": string("Optional additional arguments (e.g., specific test file or pattern)"),
            }),
            &[],
        ),
        // Version control
        tool(
            "git_status",
            "Show the current git status including modified, staged, and untracked files.",
            json!({}),
            &[],
        ),
        tool(
            "git_diff",
            "Show git diff of changes. Can show staged, unstaged, or between commits.",
            json!({
                "staged": boolean("If true, show staged changes only (--cached)"),
                "ref": string("Optional commit/branch reference to diff against"),
                "path": string("Optional file path to limit diff to"),
            }),
            &[],
        ),
        tool(
            "git_log",
            "Show git commit history.",
            json!({
                "count": integer("Number of commits to show (default: 10)"),
                "path": string("Optional file path to show history for"),
                "format": string("Output format: 'oneline', 'short', 'medium', 'full' (default: 'oneline')"),
            }),
            &[],
        ),
        tool(
            "create_branch",
            "Create a new git branch and switch to it.",
            json!({
                "name": string("The branch name (will be sanitized)"),
                "from": string("Optional base branch/commit to create from (default: current HEAD)"),
            }),
            &["name"],
        ),
        tool(
            "commit",
            "Stage files and create a git commit.",
            json!({
                "message": string("The commit message"),
                "files": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of files to stage (default: all modified files)",
                },
            }),
            &["message"],
        ),
        tool(
            "push",
            "Push the current branch to the remote repository.",
            json!({
                "set_upstream": boolean("Whether to set upstream tracking (-u flag, default: true for new branches)"),
            }),
            &[],
        ),
        tool(
            "create_pr",
            "Create a GitHub pull request using the gh CLI.",
            json!({
                "title": string("The PR title"),
                "body": string("The PR description/body"),
                "base": string("The base branch to merge into (default: main)"),
                "draft": boolean("Whether to create as draft PR (default: false)"),
            }),
            &["title", "body"],
        ),
        tool(
            "get_pr",
            "Get details about a GitHub pull request including title, description, and diff. Use this to review PRs when given a PR URL or number.",
            json!({
                "url": string("The PR URL (e.g., https://github.com/owner/repo/pull/123) or just the PR number if in the same repo"),
            }),
            &["url"],
        ),
        // Project intelligence
        tool(
            "get_guidelines",
            "Load project guidelines from CLAUDE.md or a custom guidelines file. Use this to understand project conventions and coding standards.",
            json!({}),
            &[],
        ),
        tool(
            "find_tests",
            "Find the test file(s) associated with a source file.",
            json!({
                "source_file": string("The source file path to find tests for"),
            }),
            &["source_file"],
        ),
        tool(
            "analyze_failures",
            "Analyze test or build output to identify and summarize failures.",
            json!({
                "output": string("The build/test output to analyze"),
            }),
            &["output"],
        ),
    ]
}
