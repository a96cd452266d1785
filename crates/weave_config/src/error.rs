//! Error types for configuration loading and validation.

use weave_common::ErrorKind;

/// Errors that can occur when loading or validating a `weave.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required value was given neither on the command line, in the
    /// environment, nor in the configuration file.
    #[error("missing required setting: {0}")]
    MissingField(String),

    /// An environment override held a value of the wrong type.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidEnv {
        /// The environment variable name.
        name: String,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
