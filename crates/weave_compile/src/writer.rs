//! Writing compiled documents and their baselines.

use std::path::Path;

use tracing::{debug, info, warn};
use weave_cache::{check_output, DriftStatus, HashStore};
use weave_common::ContentHash;
use weave_yaml::{structurally_equal, validate_structure};

use crate::error::CompileError;

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or replaced.
    Written,
    /// The file already held equivalent content.
    Unchanged,
    /// A dry run would have written the file.
    DryRun,
}

/// Validates `content` and writes it to `output`, recording a baseline.
///
/// An existing output that no longer matches its baseline was edited by
/// hand and is only replaced when `force` is set. Output that is textually
/// or structurally equal to the file on disk is left alone. With `dry_run`
/// nothing on disk changes.
pub fn write_compiled_file(
    output: &Path,
    content: &str,
    store: &dyn HashStore,
    dry_run: bool,
    force: bool,
) -> Result<WriteOutcome, CompileError> {
    validate_structure(content).map_err(|e| CompileError::InvalidOutput {
        path: output.to_path_buf(),
        reason: e.to_string(),
    })?;

    let existing = match std::fs::read_to_string(output) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(CompileError::io(output, e)),
    };

    if let Some(existing) = &existing {
        match check_output(store, output)? {
            DriftStatus::Drifted { .. } if !force => {
                return Err(CompileError::ManualEdit {
                    path: output.to_path_buf(),
                });
            }
            DriftStatus::Drifted { .. } => {
                warn!(path = %output.display(), "overwriting manual edits (--force)");
            }
            DriftStatus::NoBaseline | DriftStatus::CorruptBaseline { .. } => {
                debug!(path = %output.display(), "no usable baseline, treating output as stale");
            }
            DriftStatus::Clean | DriftStatus::MissingOutput => {}
        }

        if existing.replace("\r\n", "\n") == content || structurally_equal(existing, content) {
            debug!(path = %output.display(), "output unchanged");
            if !dry_run {
                store.save(output, &ContentHash::from_text(existing))?;
            }
            return Ok(WriteOutcome::Unchanged);
        }
    }

    if dry_run {
        info!(path = %output.display(), "dry run: would write");
        return Ok(WriteOutcome::DryRun);
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CompileError::io(parent, e))?;
    }
    store.migrate(output)?;
    std::fs::write(output, content).map_err(|e| CompileError::io(output, e))?;
    store.save(output, &ContentHash::from_text(content))?;
    info!(path = %output.display(), "wrote");
    Ok(WriteOutcome::Written)
}
