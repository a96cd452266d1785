//! Error types for compilation and decompilation.

use std::path::PathBuf;

use weave_cache::CacheError;
use weave_common::ErrorKind;
use weave_script::ScriptError;
use weave_source::SourceError;
use weave_yaml::YamlError;

/// Errors raised while compiling or decompiling pipeline documents.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The input directory does not exist.
    #[error("input directory not found: {path}")]
    InputNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// The input directory holds no pipeline documents.
    #[error("no YAML documents found in {path}")]
    NoDocuments {
        /// The searched directory.
        path: PathBuf,
    },

    /// The input YAML file for decompilation does not exist.
    #[error("Input YAML file not found: {path}")]
    InputFileNotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// A script or variable file problem inside one document.
    #[error("{document}: {source}")]
    Script {
        /// Document being compiled.
        document: String,
        /// Underlying error.
        source: ScriptError,
    },

    /// A document is not valid YAML.
    #[error("{document}: {source}")]
    Yaml {
        /// Document being processed.
        document: String,
        /// Underlying error.
        source: YamlError,
    },

    /// The compiled text failed structural validation.
    #[error("compiled output for {path} is not valid YAML: {reason}")]
    InvalidOutput {
        /// Output path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A packaged artifact exceeds the configured limit.
    #[error("artifact {source_path} is too large: {size} exceeds limit of {limit}")]
    ArtifactTooLarge {
        /// Artifact source.
        source_path: PathBuf,
        /// Human-readable compressed size.
        size: String,
        /// Human-readable limit.
        limit: String,
    },

    /// Building an artifact archive failed.
    #[error("failed to package artifact {source_path}: {reason}")]
    Archive {
        /// Artifact source.
        source_path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The output was edited by hand since it was last compiled.
    #[error(
        "{path} was modified since it was last compiled; refusing to overwrite it \
         (review the change with `weave detect-drift`, or pass --force)"
    )]
    ManualEdit {
        /// Output path.
        path: PathBuf,
    },

    /// One or more documents failed; each failure was logged.
    #[error("{} of {total} documents failed to compile; first failure: {}", failures.len(), first_failure(failures))]
    DocumentsFailed {
        /// Document path and error for each failure.
        failures: Vec<(String, CompileError)>,
        /// Documents attempted.
        total: usize,
    },

    /// The worker pool could not be created.
    #[error("could not start worker pool: {reason}")]
    WorkerPool {
        /// Builder message.
        reason: String,
    },

    /// An I/O error on a document or output file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Source discovery failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Hash record storage failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

fn first_failure(failures: &[(String, CompileError)]) -> String {
    failures
        .first()
        .map(|(doc, e)| format!("{doc}: {e}"))
        .unwrap_or_default()
}

impl CompileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::InputNotFound { .. }
            | CompileError::NoDocuments { .. }
            | CompileError::InputFileNotFound { .. }
            | CompileError::Io { .. } => ErrorKind::NotFound,
            CompileError::Script { source, .. } => source.kind(),
            CompileError::Yaml { .. } | CompileError::InvalidOutput { .. } => {
                ErrorKind::Validation
            }
            CompileError::ArtifactTooLarge { .. }
            | CompileError::Archive { .. }
            | CompileError::ManualEdit { .. }
            | CompileError::WorkerPool { .. } => ErrorKind::Compile,
            CompileError::DocumentsFailed { failures, .. } => failures
                .first()
                .map_or(ErrorKind::Compile, |(_, e)| e.kind()),
            CompileError::Source(e) => e.kind(),
            CompileError::Cache(e) => e.kind(),
        }
    }
}
