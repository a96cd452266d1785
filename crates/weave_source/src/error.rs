//! Error types for source tree scanning.

use std::path::PathBuf;

use weave_common::ErrorKind;

/// Errors raised while scanning the input tree.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The directory to scan does not exist.
    #[error("directory not found: {path}")]
    DirectoryNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// A file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl SourceError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::DirectoryNotFound { .. } => ErrorKind::NotFound,
            SourceError::Io { .. } => ErrorKind::NotFound,
        }
    }
}
