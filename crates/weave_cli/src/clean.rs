//! `weave clean`: remove generated files that still match their baselines.

use weave_cache::{clean_outputs, FsHashStore};

use crate::pipeline::{exit_code, load_config, resolve_output_dir, EXIT_MISCONFIGURED};
use crate::{CleanArgs, GlobalArgs};

/// Runs the `weave clean` command.
///
/// Hand-edited outputs are left in place and reported.
pub fn run(args: &CleanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let output_dir = match load_config(global)
        .and_then(|config| resolve_output_dir(args.output_dir.as_deref(), &config))
    {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };
    if !output_dir.is_dir() {
        eprintln!("error: output directory not found: {}", output_dir.display());
        return Ok(EXIT_MISCONFIGURED);
    }

    let store = FsHashStore::new(&output_dir);
    let report = match clean_outputs(&store, args.dry_run) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };

    if !global.quiet {
        let verb = if args.dry_run { "Would remove" } else { "Removed" };
        for path in &report.removed {
            eprintln!("{verb:>12} {}", path.display());
        }
        for path in &report.skipped {
            eprintln!("warning: kept {} because it was edited by hand", path.display());
        }
        eprintln!(
            "    Finished {} removed, {} kept, {} stale baselines dropped",
            report.removed.len(),
            report.skipped.len(),
            report.stale_records.len()
        );
    }

    Ok(0)
}
