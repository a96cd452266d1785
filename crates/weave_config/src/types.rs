//! Configuration types deserialized from `weave.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// The top-level configuration parsed from `weave.toml`.
///
/// Every section is optional; an absent file is equivalent to an empty one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeaveConfig {
    /// Where to read sources from and write outputs to.
    #[serde(default)]
    pub compile: CompileSection,
    /// Limits for the artifact packager.
    #[serde(default)]
    pub artifacts: ArtifactSection,
    /// Limits for the interpreter packager.
    #[serde(default)]
    pub interpreters: InterpreterSection,
    /// Output banner settings.
    #[serde(default)]
    pub output: OutputSection,
}

/// The `[compile]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompileSection {
    /// Directory holding documents, scripts, and variable files.
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
    /// Directory receiving compiled documents.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Worker pool size; defaults to the logical CPU count.
    #[serde(default)]
    pub parallelism: Option<usize>,
    /// Compute everything but write nothing.
    #[serde(default)]
    pub dry_run: bool,
    /// Recompile even when inputs are unchanged, and overwrite hand-edited outputs.
    #[serde(default)]
    pub force: bool,
}

/// The `[artifacts]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtifactSection {
    /// Encoded archives above this size abort compilation.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,
    /// Encoded archives above this size are logged as a warning.
    #[serde(default = "default_warn_size_kb")]
    pub warn_size_kb: f64,
}

impl ArtifactSection {
    /// Maximum archive size in bytes.
    pub fn max_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0) as u64
    }

    /// Warning threshold in bytes.
    pub fn warn_bytes(&self) -> u64 {
        (self.warn_size_kb * 1024.0) as u64
    }
}

impl Default for ArtifactSection {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
            warn_size_kb: default_warn_size_kb(),
        }
    }
}

fn default_max_size_mb() -> f64 {
    1.0
}

fn default_warn_size_kb() -> f64 {
    100.0
}

/// The `[interpreters]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterpreterSection {
    /// Longest quoted program text the interpreter packager will embed.
    #[serde(default = "default_max_inline_len")]
    pub max_inline_len: usize,
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            max_inline_len: default_max_inline_len(),
        }
    }
}

fn default_max_inline_len() -> usize {
    10_000
}

/// The `[output]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputSection {
    /// Replaces the generated banner verbatim.
    #[serde(default)]
    pub custom_header: Option<String>,
}
