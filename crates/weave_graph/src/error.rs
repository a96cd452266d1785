//! Error types for graph construction.

use std::path::PathBuf;

use weave_common::ErrorKind;
use weave_source::SourceError;

/// Errors raised while building a dependency graph.
///
/// Unreadable documents, missing scripts and refused references are logged
/// and skipped rather than reported here.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The root directory does not exist.
    #[error("input directory not found: {path}")]
    InputNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// Scanning the root failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl GraphError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::InputNotFound { .. } => ErrorKind::NotFound,
            GraphError::Source(e) => e.kind(),
        }
    }
}
