//! Repository-scoped path resolution

use std::path::{Component, Path, PathBuf};

use super::CodebaseError;

/// Root directory every codebase operation is confined to.
///
/// Resolution is lexical: `..` is folded against the components already
/// seen and may never climb above the root. Symlinks inside the repository
/// are followed by the OS as usual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRoot {
    root: PathBuf,
}

impl RepoRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path. Leading `/` is treated as the
    /// repository root, not the filesystem root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, CodebaseError> {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(CodebaseError::PathEscapes(relative.to_string()));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        let mut resolved = self.root.clone();
        resolved.extend(parts);
        Ok(resolved)
    }

    /// Path relative to the root, `/`-separated, for display to the model
    pub fn display(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_inside_root() {
        let root = RepoRoot::new("/repo");
        assert_eq!(root.resolve("src/main.rs").unwrap(), PathBuf::from("/repo/src/main.rs"));
        assert_eq!(root.resolve("/src/./lib.rs").unwrap(), PathBuf::from("/repo/src/lib.rs"));
        assert_eq!(root.resolve("a/../b").unwrap(), PathBuf::from("/repo/b"));
        assert_eq!(root.resolve("").unwrap(), PathBuf::from("/repo"));
    }

    #[test]
    fn test_rejects_escape() {
        let root = RepoRoot::new("/repo");
        assert!(matches!(
            root.resolve("../etc/passwd"),
            Err(CodebaseError::PathEscapes(_))
        ));
        assert!(root.resolve("a/../../x").is_err());
    }

    #[test]
    fn test_sibling_prefix_is_not_inside() {
        // "/repo-other" shares a string prefix with "/repo" but is outside it
        let root = RepoRoot::new("/repo");
        assert!(root.resolve("../repo-other/file").is_err());
    }

    #[test]
    fn test_display_is_relative() {
        let root = RepoRoot::new("/repo");
        assert_eq!(root.display(Path::new("/repo/src/a.rs")), "src/a.rs");
    }
}
