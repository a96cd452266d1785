//! Resolution of effective compile options from flags, environment, and file.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::types::WeaveConfig;

/// Values supplied on the command line; `None`/`false` defers to the config.
#[derive(Debug, Clone, Default)]
pub struct CompileOverrides {
    /// `--in`
    pub input_dir: Option<PathBuf>,
    /// `--out`
    pub output_dir: Option<PathBuf>,
    /// `--dry-run`
    pub dry_run: bool,
    /// `--force`
    pub force: bool,
    /// `--parallelism`
    pub parallelism: Option<usize>,
}

/// Fully resolved settings for one compile run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Directory holding documents, scripts, and variable files.
    pub input_dir: PathBuf,
    /// Directory receiving compiled documents.
    pub output_dir: PathBuf,
    /// Suppress every filesystem mutation.
    pub dry_run: bool,
    /// Ignore the change detector and overwrite hand-edited outputs.
    pub force: bool,
    /// Worker pool size.
    pub parallelism: usize,
    /// Hard limit for a packaged artifact, in bytes.
    pub max_artifact_bytes: u64,
    /// Warning threshold for a packaged artifact, in bytes.
    pub warn_artifact_bytes: u64,
    /// Longest program text the interpreter packager embeds.
    pub max_inline_len: usize,
    /// Banner replacement.
    pub custom_header: Option<String>,
}

impl CompileOptions {
    /// Options with default limits for the given directories.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let defaults = WeaveConfig::default();
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            dry_run: false,
            force: false,
            parallelism: default_parallelism(),
            max_artifact_bytes: defaults.artifacts.max_bytes(),
            warn_artifact_bytes: defaults.artifacts.warn_bytes(),
            max_inline_len: defaults.interpreters.max_inline_len,
            custom_header: None,
        }
    }
}

/// Merges command-line overrides over the (already env-adjusted) config.
///
/// Boolean flags can only switch a setting on; a `true` in the config stays
/// in effect when the flag is absent.
pub fn resolve_compile(
    config: &WeaveConfig,
    overrides: &CompileOverrides,
) -> Result<CompileOptions, ConfigError> {
    let input_dir = overrides
        .input_dir
        .clone()
        .or_else(|| config.compile.input_dir.clone())
        .ok_or_else(|| ConfigError::MissingField("compile.input_dir (or --in)".to_string()))?;
    let output_dir = overrides
        .output_dir
        .clone()
        .or_else(|| config.compile.output_dir.clone())
        .ok_or_else(|| ConfigError::MissingField("compile.output_dir (or --out)".to_string()))?;
    let parallelism = overrides
        .parallelism
        .or(config.compile.parallelism)
        .unwrap_or_else(default_parallelism);
    if parallelism == 0 {
        return Err(ConfigError::ValidationError(
            "parallelism must be at least 1".to_string(),
        ));
    }

    Ok(CompileOptions {
        input_dir,
        output_dir,
        dry_run: overrides.dry_run || config.compile.dry_run,
        force: overrides.force || config.compile.force,
        parallelism,
        max_artifact_bytes: config.artifacts.max_bytes(),
        warn_artifact_bytes: config.artifacts.warn_bytes(),
        max_inline_len: config.interpreters.max_inline_len,
        custom_header: config.output.custom_header.clone(),
    })
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn flags_win_over_config() {
        let config = load_config_from_str(
            "[compile]\ninput_dir = \"src\"\noutput_dir = \"out\"\nparallelism = 8\n",
        )
        .unwrap();
        let overrides = CompileOverrides {
            input_dir: Some(PathBuf::from("cli-src")),
            parallelism: Some(2),
            ..Default::default()
        };
        let opts = resolve_compile(&config, &overrides).unwrap();
        assert_eq!(opts.input_dir, PathBuf::from("cli-src"));
        assert_eq!(opts.output_dir, PathBuf::from("out"));
        assert_eq!(opts.parallelism, 2);
    }

    #[test]
    fn config_flags_stay_on() {
        let config = load_config_from_str(
            "[compile]\ninput_dir = \"a\"\noutput_dir = \"b\"\ndry_run = true\n",
        )
        .unwrap();
        let opts = resolve_compile(&config, &CompileOverrides::default()).unwrap();
        assert!(opts.dry_run);
        assert!(!opts.force);
        assert!(opts.parallelism >= 1);
    }

    #[test]
    fn missing_input_dir_errors() {
        let overrides = CompileOverrides {
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let err = resolve_compile(&WeaveConfig::default(), &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f.contains("input_dir")));
    }

    #[test]
    fn zero_parallelism_flag_rejected() {
        let overrides = CompileOverrides {
            input_dir: Some(PathBuf::from("a")),
            output_dir: Some(PathBuf::from("b")),
            parallelism: Some(0),
            ..Default::default()
        };
        let err = resolve_compile(&WeaveConfig::default(), &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn limits_flow_from_config() {
        let config = load_config_from_str(
            "[compile]\ninput_dir = \"a\"\noutput_dir = \"b\"\n[interpreters]\nmax_inline_len = 77\n",
        )
        .unwrap();
        let opts = resolve_compile(&config, &CompileOverrides::default()).unwrap();
        assert_eq!(opts.max_inline_len, 77);
        assert_eq!(opts.max_artifact_bytes, 1024 * 1024);
    }
}
