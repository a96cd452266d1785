//! Error types for cache operations.

use std::path::PathBuf;

use weave_common::ErrorKind;

/// Errors that can occur while reading or writing hash records.
///
/// Reads are mostly fail-safe: an unreadable or undecodable record is
/// reported as "state unknown" to the caller, which then recompiles or
/// reports drift. This enum covers failures that cannot be handled that way.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Io { .. } => ErrorKind::NotFound,
            CacheError::Serialization { .. } => ErrorKind::Compile,
        }
    }
}
