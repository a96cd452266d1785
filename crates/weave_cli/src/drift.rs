//! `weave detect-drift`: find generated files edited since compilation.
//!
//! Every output with a baseline in `.weave/output_hashes` is compared with
//! the content recorded when it was written. Drifted files are reported with
//! a unified diff on stdout so the output can be piped or saved.

use weave_cache::{detect_drift, DriftReport, FsHashStore};

use crate::pipeline::{
    colorize_diff, exit_code, load_config, resolve_output_dir, EXIT_DRIFT, EXIT_MISCONFIGURED,
};
use crate::{DriftArgs, GlobalArgs};

/// Runs the `weave detect-drift` command.
///
/// Returns 3 when any output drifted, 1 when an output is missing or its
/// baseline is corrupt, and 0 otherwise (including when nothing was ever
/// compiled into the directory).
pub fn run(args: &DriftArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
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
    let report = match detect_drift(&store) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };

    if report.checked == 0 {
        if !global.quiet {
            eprintln!(
                "warning: no baselines found in {}; run `weave compile` first",
                output_dir.display()
            );
        }
        return Ok(0);
    }

    print_report(&report, global.color);
    Ok(drift_exit_code(&report))
}

fn print_report(report: &DriftReport, color: bool) {
    for drifted in &report.drifted {
        println!("DRIFT DETECTED IN: {}", drifted.path.display());
        if color {
            print!("{}", colorize_diff(&drifted.diff));
        } else {
            print!("{}", drifted.diff);
        }
    }
    for (path, problem) in &report.problems {
        eprintln!("error: {}: {problem}", path.display());
    }
}

fn drift_exit_code(report: &DriftReport) -> i32 {
    if !report.drifted.is_empty() {
        EXIT_DRIFT
    } else if !report.problems.is_empty() {
        1
    } else {
        0
    }
}
