//! File writing within the repository

use super::{CodebaseError, RepoRoot};

#[derive(Debug, Clone)]
pub struct FileWriter {
    root: RepoRoot,
}

impl FileWriter {
    pub fn new(root: RepoRoot) -> Self {
        Self { root }
    }

    /// Create or overwrite a file, creating parent directories as needed.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), CodebaseError> {
        let full = self.root.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(CodebaseError::io("failed to create directories for", parent))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(CodebaseError::io("failed to write", &full))
    }

    /// Replace the single occurrence of `old_text` with `new_text`.
    pub async fn edit_file(
        &self,
        path: &str,
        old_text: &str,
        new_text: &str,
    ) -> Result<(), CodebaseError> {
        let full = self.root.resolve(path)?;
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(CodebaseError::io("failed to read", &full))?;
        let content = String::from_utf8(bytes).map_err(|_| CodebaseError::NotText(full.clone()))?;

        if old_text.is_empty() {
            return Err(CodebaseError::TextNotFound);
        }
        match content.matches(old_text).count() {
            0 => return Err(CodebaseError::TextNotFound),
            1 => {}
            n => return Err(CodebaseError::AmbiguousEdit(n)),
        }

        let updated = content.replacen(old_text, new_text, 1);
        tokio::fs::write(&full, updated)
            .await
            .map_err(CodebaseError::io("failed to write", &full))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(RepoRoot::new(dir.path()));

        writer.write_file("deep/nested/file.rs", "fn main() {}").await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("deep/nested/file.rs")).unwrap();
        assert_eq!(written, "fn main() {}");
    }

    #[tokio::test]
    async fn test_edit_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "alpha beta alpha").unwrap();
        let writer = FileWriter::new(RepoRoot::new(dir.path()));

        assert!(matches!(
            writer.edit_file("f.txt", "alpha", "x").await,
            Err(CodebaseError::AmbiguousEdit(2))
        ));
        assert!(matches!(
            writer.edit_file("f.txt", "gamma", "x").await,
            Err(CodebaseError::TextNotFound)
        ));

        writer.edit_file("f.txt", "beta", "BETA").await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(content, "alpha BETA alpha");
    }

    #[tokio::test]
    async fn test_write_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(RepoRoot::new(dir.path()));
        assert!(matches!(
            writer.write_file("../../evil", "x").await,
            Err(CodebaseError::PathEscapes(_))
        ));
    }
}
