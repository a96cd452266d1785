//! Removing generated outputs that were never hand-edited.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::drift::{check_output, DriftStatus};
use crate::error::CacheError;
use crate::store::HashStore;

/// What a clean pass did (or would do, on a dry run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Outputs deleted along with their baselines.
    pub removed: Vec<PathBuf>,
    /// Outputs left in place because they drifted or could not be checked.
    pub skipped: Vec<PathBuf>,
    /// Baselines dropped because their output no longer exists.
    pub stale_records: Vec<PathBuf>,
}

/// Deletes every tracked output that still matches its baseline.
pub fn clean_outputs(store: &dyn HashStore, dry_run: bool) -> Result<CleanReport, CacheError> {
    let mut report = CleanReport::default();
    for output in store.tracked()? {
        match check_output(store, &output)? {
            DriftStatus::Clean => {
                if !dry_run {
                    std::fs::remove_file(&output).map_err(|e| CacheError::io(&output, e))?;
                    store.remove(&output)?;
                }
                info!(path = %output.display(), dry_run, "removed generated file");
                report.removed.push(output);
            }
            DriftStatus::MissingOutput => {
                if !dry_run {
                    store.remove(&output)?;
                }
                report.stale_records.push(output);
            }
            DriftStatus::Drifted { .. } | DriftStatus::CorruptBaseline { .. } => {
                warn!(path = %output.display(), "not removing a generated file that was modified");
                report.skipped.push(output);
            }
            DriftStatus::NoBaseline => {}
        }
    }
    Ok(report)
}
