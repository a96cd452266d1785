//! Configuration file loading, environment overrides, and validation.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::ConfigError;
use crate::types::WeaveConfig;

/// File name searched for when no explicit config path is given.
pub const CONFIG_FILE: &str = "weave.toml";

/// Prefix of every environment override.
const ENV_PREFIX: &str = "WEAVE_";

/// Walks up from `start` looking for the nearest `weave.toml`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Loads and validates the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<WeaveConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "Loaded configuration file");
    load_config_from_str(&content)
}

/// Loads the nearest `weave.toml` above `start`, or the defaults if none exists.
pub fn discover_config(start: &Path) -> Result<WeaveConfig, ConfigError> {
    match find_config_file(start) {
        Some(path) => load_config(&path),
        None => Ok(WeaveConfig::default()),
    }
}

/// Parses and validates a `weave.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<WeaveConfig, ConfigError> {
    let config: WeaveConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Layers `WEAVE_*` variables from `vars` on top of `config`.
///
/// Unrelated variables are ignored. Values that fail to parse are errors
/// rather than being silently dropped.
pub fn apply_env_overrides<I>(mut config: WeaveConfig, vars: I) -> Result<WeaveConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in vars {
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match key {
            "INPUT_DIR" => config.compile.input_dir = Some(PathBuf::from(&value)),
            "OUTPUT_DIR" => config.compile.output_dir = Some(PathBuf::from(&value)),
            "PARALLELISM" => config.compile.parallelism = Some(parse_env(&name, &value)?),
            "DRY_RUN" => config.compile.dry_run = parse_bool(&name, &value)?,
            "FORCE" => config.compile.force = parse_bool(&name, &value)?,
            "MAX_ARTIFACT_SIZE_MB" => config.artifacts.max_size_mb = parse_env(&name, &value)?,
            "ARTIFACT_WARN_SIZE_KB" => config.artifacts.warn_size_kb = parse_env(&name, &value)?,
            "MAX_INLINE_LEN" => config.interpreters.max_inline_len = parse_env(&name, &value)?,
            "CUSTOM_HEADER" => config.output.custom_header = Some(value),
            _ => continue,
        }
        debug!(variable = %name, "Applied environment override");
    }
    validate_config(&config)?;
    Ok(config)
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Validates that configuration values are consistent.
fn validate_config(config: &WeaveConfig) -> Result<(), ConfigError> {
    if config.compile.parallelism == Some(0) {
        return Err(ConfigError::ValidationError(
            "compile.parallelism must be at least 1".to_string(),
        ));
    }
    let artifacts = &config.artifacts;
    if artifacts.max_size_mb <= 0.0 || artifacts.warn_size_kb <= 0.0 {
        return Err(ConfigError::ValidationError(
            "artifact size limits must be positive".to_string(),
        ));
    }
    if artifacts.warn_bytes() > artifacts.max_bytes() {
        return Err(ConfigError::ValidationError(
            "artifacts.warn_size_kb exceeds artifacts.max_size_mb".to_string(),
        ));
    }
    if config.interpreters.max_inline_len == 0 {
        return Err(ConfigError::ValidationError(
            "interpreters.max_inline_len must be positive".to_string(),
        ));
    }
    Ok(())
}
