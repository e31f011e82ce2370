//! File reading, search and editing tools

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, ToolContext, ToolError, ToolHandler, ToolRegistry, Toolbox};
use crate::codebase::{format_matches, CodeSearcher, FileReader, FileWriter};
use crate::executor::analyze_output;

pub(super) fn register(registry: &mut ToolRegistry, toolbox: &Toolbox) {
    let reader = toolbox.reader();
    let searcher = toolbox.searcher();
    let writer = toolbox.writer();

    registry.register("read_file", Arc::new(ReadFile(reader.clone())));
    registry.register("list_files", Arc::new(ListFiles(searcher.clone())));
    registry.register("search_code", Arc::new(SearchCode(searcher.clone())));
    registry.register("get_tree", Arc::new(GetTree(searcher.clone())));
    registry.register("write_file", Arc::new(WriteFile(writer.clone())));
    registry.register("edit_file", Arc::new(EditFile(writer)));
    registry.register(
        "get_guidelines",
        Arc::new(GetGuidelines {
            reader,
            file: toolbox.guidelines_file.clone(),
        }),
    );
    registry.register("find_tests", Arc::new(FindTests(searcher)));
    registry.register("analyze_failures", Arc::new(AnalyzeFailures));
}

struct ReadFile(FileReader);

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
    start_line: Option<usize>,
    end_line: Option<usize>,
}

#[async_trait]
impl ToolHandler for ReadFile {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: ReadFileArgs = parse_args(args)?;
        if args.start_line.is_some() || args.end_line.is_some() {
            return Ok(self.0.read_lines(&args.path, args.start_line, args.end_line).await?);
        }
        Ok(self.0.read_file(&args.path).await?)
    }
}

struct ListFiles(CodeSearcher);

#[derive(Deserialize)]
struct ListFilesArgs {
    pattern: String,
}

#[async_trait]
impl ToolHandler for ListFiles {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: ListFilesArgs = parse_args(args)?;
        let searcher = self.0.clone();
        let files = blocking(move || searcher.list_files(&args.pattern)).await?;
        if files.is_empty() {
            return Ok("No files found matching pattern".to_string());
        }
        Ok(files.join("\n"))
    }
}

struct SearchCode(CodeSearcher);

#[derive(Deserialize)]
struct SearchCodeArgs {
    pattern: String,
    path: Option<String>,
    #[serde(default)]
    case_sensitive: bool,
    max_results: Option<usize>,
}

#[async_trait]
impl ToolHandler for SearchCode {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: SearchCodeArgs = parse_args(args)?;
        let searcher = self.0.clone();
        let matches = blocking(move || {
            searcher.search_code(
                &args.pattern,
                args.path.as_deref(),
                args.case_sensitive,
                args.max_results,
            )
        })
        .await?;
        Ok(format_matches(&matches))
    }
}

struct GetTree(CodeSearcher);

#[derive(Deserialize)]
struct GetTreeArgs {
    path: Option<String>,
    max_depth: Option<usize>,
}

#[async_trait]
impl ToolHandler for GetTree {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: GetTreeArgs = parse_args(args)?;
        let searcher = self.0.clone();
        blocking(move || searcher.get_tree(args.path.as_deref(), args.max_depth)).await
    }
}

struct WriteFile(FileWriter);

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait]
impl ToolHandler for WriteFile {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: WriteFileArgs = parse_args(args)?;
        self.0.write_file(&args.path, &args.content).await?;
        Ok(format!("Successfully wrote {}", args.path))
    }
}

struct EditFile(FileWriter);

#[derive(Deserialize)]
struct EditFileArgs {
    path: String,
    old_text: String,
    new_text: String,
}

#[async_trait]
impl ToolHandler for EditFile {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: EditFileArgs = parse_args(args)?;
        self.0.edit_file(&args.path, &args.old_text, &args.new_text).await?;
        Ok(format!("Successfully edited {}", args.path))
    }
}

struct GetGuidelines {
    reader: FileReader,
    file: String,
}

#[async_trait]
impl ToolHandler for GetGuidelines {
    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        for candidate in [self.file.as_str(), "CLAUDE.md"] {
            if let Ok(content) = self.reader.read_file(candidate).await {
                return Ok(content);
            }
        }
        Ok("No guidelines file found in repository.".to_string())
    }
}

struct FindTests(CodeSearcher);

#[derive(Deserialize)]
struct FindTestsArgs {
    source_file: String,
}

#[async_trait]
impl ToolHandler for FindTests {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: FindTestsArgs = parse_args(args)?;
        let searcher = self.0.clone();
        let source = args.source_file.clone();
        let tests = blocking(move || searcher.find_tests(&source)).await?;
        if tests.is_empty() {
            return Ok(format!("No test files found for: {}", args.source_file));
        }
        Ok(format!("Found test files:\n{}\n", tests.join("\n")))
    }
}

struct AnalyzeFailures;

#[derive(Deserialize)]
struct AnalyzeFailuresArgs {
    output: String,
}

#[async_trait]
impl ToolHandler for AnalyzeFailures {
    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let args: AnalyzeFailuresArgs = parse_args(args)?;
        Ok(analyze_output(&args.output).summary())
    }
}

/// Directory walks run off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Result<T, crate::codebase::CodebaseError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => Ok(result?),
        Err(e) => Err(ToolError::TaskFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn setup() -> (tempfile::TempDir, super::super::ToolDispatcher) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn answer() -> u32 {\n    42\n}\n").unwrap();
        let dispatcher = Toolbox::for_repo(dir.path()).dispatcher().unwrap();
        (dir, dispatcher)
    }

    fn ctx() -> ToolContext {
        ToolContext::new(CancellationToken::new(), "t")
    }

    #[tokio::test]
    async fn test_read_and_search() {
        let (_dir, d) = setup();
        let content = d.execute("read_file", json!({"path": "src/lib.rs", "start_line": 2, "end_line": 2}), &ctx()).await.unwrap();
        assert_eq!(content, "   2 |     42");

        let found = d.execute("search_code", json!({"pattern": "ANSWER"}), &ctx()).await.unwrap();
        assert_eq!(found, "src/lib.rs:1: pub fn answer() -> u32 {");

        let files = d.execute("list_files", json!({"pattern": "**/*.rs"}), &ctx()).await.unwrap();
        assert_eq!(files, "src/lib.rs");
    }

    #[tokio::test]
    async fn test_write_then_edit() {
        let (dir, d) = setup();
        let out = d.execute("write_file", json!({"path": "notes/a.md", "content": "draft one"}), &ctx()).await.unwrap();
        assert_eq!(out, "Successfully wrote notes/a.md");

        d.execute("edit_file", json!({"path": "notes/a.md", "old_text": "one", "new_text": "two"}), &ctx()).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("notes/a.md")).unwrap(), "draft two");
    }

    #[tokio::test]
    async fn test_guidelines_fallback() {
        let (dir, d) = setup();
        let none = d.execute("get_guidelines", json!({}), &ctx()).await.unwrap();
        assert_eq!(none, "No guidelines file found in repository.");

        std::fs::write(dir.path().join("CLAUDE.md"), "Use tabs.").unwrap();
        assert_eq!(d.execute("get_guidelines", json!({}), &ctx()).await.unwrap(), "Use tabs.");
    }

    #[tokio::test]
    async fn test_find_tests_messages() {
        let (_dir, d) = setup();
        let out = d.execute("find_tests", json!({"source_file": "src/lib.rs"}), &ctx()).await.unwrap();
        assert_eq!(out, "No test files found for: src/lib.rs");
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let (_dir, d) = setup();
        let err = d.execute("read_file", json!({}), &ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
