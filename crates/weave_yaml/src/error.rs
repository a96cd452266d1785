//! Error types for document handling.

use weave_common::ErrorKind;

/// A document failed to parse as YAML.
#[derive(Debug, thiserror::Error)]
pub enum YamlError {
    /// The text is not well-formed YAML.
    #[error("invalid YAML: {reason}")]
    Invalid {
        /// Parser message, including the location when known.
        reason: String,
    },
}

impl YamlError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

impl From<serde_yaml::Error> for YamlError {
    fn from(e: serde_yaml::Error) -> Self {
        YamlError::Invalid {
            reason: e.to_string(),
        }
    }
}
