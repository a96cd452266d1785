//! Detecting hand edits to generated files.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::diff::unified_diff;
use crate::error::CacheError;
use crate::store::{Baseline, HashStore};

/// State of one output relative to its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftStatus {
    /// The file matches what was last written.
    Clean,
    /// The file was edited after it was written.
    Drifted {
        /// Unified diff from the baseline to the current content.
        diff: String,
    },
    /// No baseline has been recorded.
    NoBaseline,
    /// The baseline exists but cannot be decoded.
    CorruptBaseline {
        /// Decoder message.
        reason: String,
    },
    /// The baseline exists but the output file does not.
    MissingOutput,
}

/// A baseline that could not be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftProblem {
    /// The output file is gone.
    MissingOutput,
    /// The baseline does not decode.
    CorruptBaseline {
        /// Decoder message.
        reason: String,
    },
}

impl fmt::Display for DriftProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftProblem::MissingOutput => f.write_str("output file is missing"),
            DriftProblem::CorruptBaseline { reason } => {
                write!(f, "baseline could not be decoded: {reason}")
            }
        }
    }
}

/// An output that differs from its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftedFile {
    /// The output file.
    pub path: PathBuf,
    /// Unified diff from the baseline to the current content.
    pub diff: String,
}

/// Outcome of checking every baseline in a store.
#[derive(Debug, Clone, Default)]
pub struct DriftReport {
    /// Number of baselines examined.
    pub checked: usize,
    /// Outputs that were edited.
    pub drifted: Vec<DriftedFile>,
    /// Baselines that could not be checked.
    pub problems: Vec<(PathBuf, DriftProblem)>,
}

impl DriftReport {
    /// `true` if any output drifted or any baseline could not be checked.
    pub fn has_drift(&self) -> bool {
        !self.drifted.is_empty() || !self.problems.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Compares one output against its baseline.
pub fn check_output(store: &dyn HashStore, output: &Path) -> Result<DriftStatus, CacheError> {
    let baseline = match store.baseline(output)? {
        Baseline::Missing => return Ok(DriftStatus::NoBaseline),
        Baseline::Corrupt { reason } => {
            error!(path = %output.display(), %reason, "Could not decode the .hash file");
            return Ok(DriftStatus::CorruptBaseline { reason });
        }
        Baseline::Present(text) => text,
    };
    let current = match std::fs::read_to_string(output) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(path = %output.display(), "Output file is missing for hash file");
            return Ok(DriftStatus::MissingOutput);
        }
        Err(e) => return Err(CacheError::io(output, e)),
    };

    let (baseline, current) = (normalize(&baseline), normalize(&current));
    if baseline == current {
        return Ok(DriftStatus::Clean);
    }
    let label = output.display().to_string();
    let diff = unified_diff(
        &baseline,
        &current,
        &format!("{label} (last compiled)"),
        &format!("{label} (current)"),
    );
    Ok(DriftStatus::Drifted { diff })
}

/// Checks every baseline in `store`.
pub fn detect_drift(store: &dyn HashStore) -> Result<DriftReport, CacheError> {
    let mut report = DriftReport::default();
    for output in store.tracked()? {
        report.checked += 1;
        match check_output(store, &output)? {
            DriftStatus::Clean => debug!(path = %output.display(), "no drift"),
            DriftStatus::NoBaseline => {}
            DriftStatus::Drifted { diff } => {
                warn!(path = %output.display(), "generated file was edited after compilation");
                report.drifted.push(DriftedFile { path: output, diff });
            }
            DriftStatus::CorruptBaseline { reason } => report
                .problems
                .push((output, DriftProblem::CorruptBaseline { reason })),
            DriftStatus::MissingOutput => {
                report.problems.push((output, DriftProblem::MissingOutput))
            }
        }
    }
    Ok(report)
}
