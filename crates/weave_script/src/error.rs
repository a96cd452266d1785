//! Error types for script analysis.

use std::path::PathBuf;

use weave_common::ErrorKind;

/// Errors raised while classifying, expanding, or reading script-side input.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A pragma was recognized but its arguments are malformed.
    #[error("invalid pragma '{line}': {reason}")]
    BadPragma {
        /// The offending line.
        line: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A variable file line could not be parsed.
    #[error("malformed variable file {path} line {line}: {reason}")]
    MalformedVariableFile {
        /// The variable file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A referenced script is absent from the source map.
    #[error("referenced script '{reference}' not found (looked for {path})")]
    MissingScript {
        /// The reference as written.
        reference: String,
        /// Where it was expected.
        path: PathBuf,
    },

    /// A referenced script has no content once its preamble is removed.
    #[error("referenced script '{reference}' is empty")]
    EmptyScript {
        /// The reference as written.
        reference: String,
    },

    /// Scripts source each other in a loop.
    #[error("circular source chain: {}", chain.join(" -> "))]
    SourceCycle {
        /// The chain of scripts, ending with the repeated one.
        chain: Vec<String>,
    },

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl ScriptError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::BadPragma { .. } | ScriptError::MalformedVariableFile { .. } => {
                ErrorKind::Configuration
            }
            ScriptError::MissingScript { .. } | ScriptError::Io { .. } => ErrorKind::NotFound,
            ScriptError::EmptyScript { .. } | ScriptError::SourceCycle { .. } => {
                ErrorKind::Compile
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_joins_chain() {
        let err = ScriptError::SourceCycle {
            chain: vec!["a.sh".into(), "b.sh".into(), "a.sh".into()],
        };
        assert_eq!(err.to_string(), "circular source chain: a.sh -> b.sh -> a.sh");
        assert_eq!(err.kind(), ErrorKind::Compile);
    }

    #[test]
    fn missing_script_names_reference() {
        let err = ScriptError::MissingScript {
            reference: "./build.sh".into(),
            path: PathBuf::from("/src/build.sh"),
        };
        assert!(err.to_string().contains("./build.sh"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pragma_errors_are_configuration() {
        let err = ScriptError::BadPragma {
            line: "# Pragma: inline-artifact".into(),
            reason: "missing path".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
