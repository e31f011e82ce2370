//! File reading within the repository

use super::{CodebaseError, RepoRoot};

#[derive(Debug, Clone)]
pub struct FileReader {
    root: RepoRoot,
}

impl FileReader {
    pub fn new(root: RepoRoot) -> Self {
        Self { root }
    }

    /// Whole file as text
    pub async fn read_file(&self, path: &str) -> Result<String, CodebaseError> {
        let full = self.root.resolve(path)?;
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(CodebaseError::io("failed to read", &full))?;
        String::from_utf8(bytes).map_err(|_| CodebaseError::NotText(full))
    }

    /// Lines `start..=end` (1-indexed) prefixed with their line numbers.
    /// Either bound may be omitted.
    pub async fn read_lines(
        &self,
        path: &str,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<String, CodebaseError> {
        let first = start.unwrap_or(1).max(1);
        if let Some(last) = end {
            if last < first {
                return Err(CodebaseError::InvalidRange { start: first, end: last });
            }
        }

        let content = self.read_file(path).await?;
        let numbered: Vec<String> = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .skip_while(|(n, _)| *n < first)
            .take_while(|(n, _)| end.map_or(true, |last| *n <= last))
            .map(|(n, line)| format!("{:4} | {}", n, line))
            .collect();

        Ok(numbered.join("\n"))
    }

    pub async fn exists(&self, path: &str) -> bool {
        match self.root.resolve(path) {
            Ok(full) => tokio::fs::metadata(full).await.is_ok(),
            Err(_) => false,
        }
    }
}
