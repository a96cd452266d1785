//! Shared pipeline helpers for CLI commands.
//!
//! Contains the pieces every command needs: logging setup, configuration
//! loading with environment overrides, the mapping from error kinds to exit
//! codes, and terminal coloring of diffs.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use weave_common::ErrorKind;
use weave_compile::CompileError;
use weave_config::{ConfigError, WeaveConfig};

use crate::GlobalArgs;

/// Exit code for a run that found nothing to work on or was misconfigured.
pub const EXIT_MISCONFIGURED: i32 = 2;

/// Exit code for `detect-drift` when a generated file was edited.
pub const EXIT_DRIFT: i32 = 3;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Returns `true` when stdout is attached to a terminal.
pub fn stdout_is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug`,
/// `--quiet` selects `warn`, and the default is `info`.
pub fn init_logging(global: &GlobalArgs) {
    let level = if global.verbose {
        "debug"
    } else if global.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(global.color)
                .with_target(false),
        )
        .with(filter)
        .init();
}

/// Loads the effective configuration.
///
/// With `--config` the named file is read; otherwise `weave.toml` is searched
/// upwards from the working directory and defaults apply when none exists.
/// `WEAVE_*` variables are layered on top either way.
pub fn load_config(global: &GlobalArgs) -> Result<WeaveConfig, ConfigError> {
    let config = match global.config {
        Some(ref path) => {
            debug!(path = %path, "loading configuration");
            weave_config::load_config(Path::new(path))?
        }
        None => weave_config::discover_config(&std::env::current_dir()?)?,
    };
    weave_config::apply_env_overrides(config, std::env::vars())
}

/// Picks the output directory from the flag or the `[compile]` section.
pub fn resolve_output_dir(
    flag: Option<&Path>,
    config: &WeaveConfig,
) -> Result<PathBuf, ConfigError> {
    flag.map(Path::to_path_buf)
        .or_else(|| config.compile.output_dir.clone())
        .ok_or_else(|| ConfigError::MissingField("compile.output_dir (or --out)".to_string()))
}

/// Picks the input directory from the flag or the `[compile]` section.
pub fn resolve_input_dir(
    flag: Option<&Path>,
    config: &WeaveConfig,
) -> Result<PathBuf, ConfigError> {
    flag.map(Path::to_path_buf)
        .or_else(|| config.compile.input_dir.clone())
        .ok_or_else(|| ConfigError::MissingField("compile.input_dir (or --in)".to_string()))
}

/// Maps an error kind onto the process exit code.
pub fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound | ErrorKind::Configuration => EXIT_MISCONFIGURED,
        ErrorKind::Security | ErrorKind::Validation | ErrorKind::Compile => 1,
    }
}

/// Exit code for a failed compile or decompile.
///
/// Only run-level problems (no input, no documents) count as "nothing
/// found"; a script missing from inside a document is a failed
/// transformation.
pub fn compile_exit_code(err: &CompileError) -> i32 {
    match err {
        CompileError::InputNotFound { .. }
        | CompileError::NoDocuments { .. }
        | CompileError::InputFileNotFound { .. }
        | CompileError::Source(_) => EXIT_MISCONFIGURED,
        other if other.kind() == ErrorKind::Configuration => EXIT_MISCONFIGURED,
        _ => 1,
    }
}

/// Prints a compile error, one line per failed document.
pub fn report_compile_error(err: &CompileError) {
    match err {
        CompileError::DocumentsFailed { failures, total } => {
            for (_, failure) in failures {
                eprintln!("error: {failure}");
            }
            eprintln!("error: {} of {total} documents failed to compile", failures.len());
        }
        other => eprintln!("error: {other}"),
    }
}

/// Colors a unified diff for the terminal.
pub fn colorize_diff(diff: &str) -> String {
    let mut out = String::with_capacity(diff.len());
    for line in diff.lines() {
        let color = if line.starts_with("+++") || line.starts_with("---") {
            None
        } else if line.starts_with('+') {
            Some(GREEN)
        } else if line.starts_with('-') {
            Some(RED)
        } else if line.starts_with("@@") {
            Some(CYAN)
        } else {
            None
        };
        match color {
            Some(code) => {
                out.push_str(code);
                out.push_str(line);
                out.push_str(RESET);
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}
