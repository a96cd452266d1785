//! Parsing and validation of `weave.toml` configuration files.
//!
//! This crate reads the optional configuration file, layers `WEAVE_*`
//! environment overrides on top, and resolves the effective
//! [`CompileOptions`] once command-line flags are applied.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{
    apply_env_overrides, discover_config, find_config_file, load_config, load_config_from_str,
    CONFIG_FILE,
};
pub use resolve::{resolve_compile, CompileOptions, CompileOverrides};
pub use types::*;
