//! Code search, file listing and tree rendering

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use regex::RegexBuilder;
use walkdir::{DirEntry, WalkDir};

use super::{CodebaseError, RepoRoot};

pub const DEFAULT_MAX_RESULTS: usize = 50;
pub const DEFAULT_TREE_DEPTH: usize = 3;

/// Files larger than this are not searched
const MAX_SEARCH_FILE_BYTES: u64 = 1024 * 1024;

/// Directories skipped by search and tree rendering
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "target", "build", "dist", "__pycache__"];

const TEXT_EXTENSIONS: &[&str] = &[
    "go", "java", "kt", "kts", "scala", "js", "jsx", "ts", "tsx", "mjs", "cjs", "py", "rb", "rs",
    "c", "h", "cc", "cpp", "hpp", "cs", "swift", "php", "sh", "bash", "zsh", "sql", "graphql",
    "proto", "html", "css", "scss", "less", "vue", "svelte", "json", "yaml", "yml", "toml", "xml",
    "ini", "cfg", "conf", "properties", "gradle", "md", "txt", "rst", "env", "lock", "mod", "sum",
];

const TEXT_FILENAMES: &[&str] = &["Makefile", "Dockerfile", "Jenkinsfile", "Gemfile", "Rakefile", "Procfile"];

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub file: String,
    pub line: usize,
    pub content: String,
}

/// Render matches as `file:line: content`, one per line
pub fn format_matches(matches: &[SearchMatch]) -> String {
    if matches.is_empty() {
        return "No matches found".to_string();
    }
    matches
        .iter()
        .map(|m| format!("{}:{}: {}", m.file, m.line, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub struct CodeSearcher {
    root: RepoRoot,
}

impl CodeSearcher {
    pub fn new(root: RepoRoot) -> Self {
        Self { root }
    }

    /// Regex search across text files.
    ///
    /// # Arguments
    /// * `pattern` - regular expression, matched per line
    /// * `scope` - directory to search under, or a glob over repo-relative paths
    /// * `case_sensitive` - matching is case-insensitive unless set
    /// * `max_results` - stop after this many matches (default 50)
    pub fn search_code(
        &self,
        pattern: &str,
        scope: Option<&str>,
        case_sensitive: bool,
        max_results: Option<usize>,
    ) -> Result<Vec<SearchMatch>, CodebaseError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| CodebaseError::InvalidPattern(e.to_string()))?;
        let limit = max_results.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_RESULTS);

        let (start, filter) = match scope.filter(|s| !s.is_empty()) {
            Some(s) if is_glob(s) => (self.root.path().to_path_buf(), Some(compile_glob(s)?)),
            Some(s) => (self.root.resolve(s)?, None),
            None => (self.root.path().to_path_buf(), None),
        };

        let mut matches = Vec::new();
        for entry in walk_source(&start) {
            if !entry.file_type().is_file() || !is_text_file(entry.path()) {
                continue;
            }
            let relative = self.root.display(entry.path());
            if let Some(glob) = &filter {
                if !glob.matches_with(&relative, GLOB_OPTIONS) {
                    continue;
                }
            }
            if entry.metadata().map(|m| m.len() > MAX_SEARCH_FILE_BYTES).unwrap_or(true) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };

            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(SearchMatch {
                        file: relative.clone(),
                        line: i + 1,
                        content: line.trim().to_string(),
                    });
                    if matches.len() >= limit {
                        return Ok(matches);
                    }
                }
            }
        }

        Ok(matches)
    }

    /// Repo-relative paths matching a glob, sorted. `**` spans directories.
    pub fn list_files(&self, pattern: &str) -> Result<Vec<String>, CodebaseError> {
        let glob = compile_glob(pattern.trim_start_matches("./"))?;

        let mut files: Vec<String> = WalkDir::new(self.root.path())
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| self.root.display(e.path()))
            .filter(|rel| glob.matches_with(rel, GLOB_OPTIONS))
            .collect();

        files.sort();
        Ok(files)
    }

    /// Indented directory tree below `path`, `max_depth` levels deep
    pub fn get_tree(&self, path: Option<&str>, max_depth: Option<usize>) -> Result<String, CodebaseError> {
        let start = self.root.resolve(path.unwrap_or(""))?;
        let depth = max_depth.filter(|d| *d > 0).unwrap_or(DEFAULT_TREE_DEPTH);

        let label = match path.filter(|p| !p.is_empty() && *p != ".") {
            Some(p) => p.trim_end_matches('/').to_string(),
            None => ".".to_string(),
        };

        let mut out = format!("{}/\n", label);
        render_tree(&start, "", 1, depth, &mut out)?;
        Ok(out)
    }

    /// Test files that probably cover `source_file`, by naming convention
    pub fn find_tests(&self, source_file: &str) -> Result<Vec<String>, CodebaseError> {
        let mut found: Vec<String> = Vec::new();
        for pattern in test_patterns(source_file) {
            for file in self.list_files(&pattern)? {
                if file != source_file && !found.contains(&file) {
                    found.push(file);
                }
            }
        }
        Ok(found)
    }
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn compile_glob(pattern: &str) -> Result<Pattern, CodebaseError> {
    Pattern::new(pattern).map_err(|e| CodebaseError::InvalidPattern(e.to_string()))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn walk_source(start: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(start)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
}

fn is_text_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if TEXT_FILENAMES.contains(&name) {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn render_tree(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    out: &mut String,
) -> Result<(), CodebaseError> {
    let mut entries: Vec<(String, bool)> = std::fs::read_dir(dir)
        .map_err(CodebaseError::io("failed to read directory", dir))?
        .filter_map(Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let hidden = name.starts_with('.');
            let skipped = is_dir && SKIPPED_DIRS.contains(&name.as_str());
            (!hidden && !skipped).then_some((name, is_dir))
        })
        .collect();
    entries.sort();

    let count = entries.len();
    for (i, (name, is_dir)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        let suffix = if is_dir { "/" } else { "" };
        out.push_str(&format!("{}{}{}{}\n", prefix, branch, name, suffix));

        if is_dir && depth < max_depth {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_tree(&dir.join(&name), &child_prefix, depth + 1, max_depth, out)?;
        }
    }
    Ok(())
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Glob patterns for the conventional test locations of a source file
fn test_patterns(source_file: &str) -> Vec<String> {
    let path = PathBuf::from(source_file);
    let dir = path
        .parent()
        .map(|p| Pattern::escape(&p.to_string_lossy()))
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| Pattern::escape(&s.to_string_lossy()))
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "java" | "kt" => {
            let test_dir = dir.replacen("main", "test", 1);
            vec![
                join(&test_dir, &format!("{}Test.{}", stem, ext)),
                join(&test_dir, &format!("{}Tests.{}", stem, ext)),
                join(&test_dir, &format!("{}IT.{}", stem, ext)),
                format!("**/{}Test.{}", stem, ext),
            ]
        }
        "go" => vec![join(&dir, &format!("{}_test.go", stem))],
        "js" | "jsx" | "ts" | "tsx" => vec![
            join(&dir, &format!("{}.test.{}", stem, ext)),
            join(&dir, &format!("{}.spec.{}", stem, ext)),
            join(&dir, &format!("__tests__/{}.{}", stem, ext)),
            join(&dir, &format!("__tests__/{}.test.{}", stem, ext)),
            format!("**/{}.test.{}", stem, ext),
            format!("**/{}.spec.{}", stem, ext),
        ],
        "py" => vec![
            join(&dir, &format!("test_{}.py", stem)),
            join(&dir, &format!("{}_test.py", stem)),
            format!("tests/test_{}.py", stem),
            format!("**/test_{}.py", stem),
        ],
        "rs" => vec![
            format!("tests/{}.rs", stem),
            format!("tests/{}_tests.rs", stem),
            format!("**/{}_test.rs", stem),
        ],
        _ => vec![
            format!("**/*{}*test*", stem),
            format!("**/*test*{}*", stem),
        ],
    }
}
