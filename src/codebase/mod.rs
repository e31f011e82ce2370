//! Path-scoped access to the repository working tree
//!
//! - `reader` - whole files or numbered line ranges
//! - `writer` - create/overwrite files and unique find/replace edits
//! - `search` - regex code search, glob listing, directory tree, test lookup
//!
//! Every path goes through [`RepoRoot::resolve`] first, so nothing here
//! touches a file outside the repository.

pub mod paths;
pub mod reader;
pub mod search;
pub mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use paths::RepoRoot;
pub use reader::FileReader;
pub use search::{format_matches, CodeSearcher, SearchMatch};
pub use writer::FileWriter;

#[derive(Debug, Error)]
pub enum CodebaseError {
    #[error("path escapes repository: {0}")]
    PathEscapes(String),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file is not valid UTF-8: {0}")]
    NotText(PathBuf),
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("old_text not found in file")]
    TextNotFound,
    #[error("old_text found {0} times in file (must be unique)")]
    AmbiguousEdit(usize),
    #[error("invalid line range {start}..{end}")]
    InvalidRange { start: usize, end: usize },
}

impl CodebaseError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CodebaseError::Io {
            action,
            path,
            source,
        }
    }
}
