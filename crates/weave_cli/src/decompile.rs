//! `weave decompile`: move inline script blocks out into `.sh` files.

use weave_compile::run_decompile;

use crate::pipeline::{compile_exit_code, report_compile_error};
use crate::{DecompileArgs, GlobalArgs};

/// Runs the `weave decompile` command.
pub fn run(args: &DecompileArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let summary = match run_decompile(&args.input, &args.output_dir, args.dry_run) {
        Ok(summary) => summary,
        Err(e) => {
            report_compile_error(&e);
            return Ok(compile_exit_code(&e));
        }
    };

    if !global.quiet {
        let verb = if args.dry_run { "would create" } else { "created" };
        eprintln!(
            "    Finished {} jobs, {} scripts extracted, {verb} {} files",
            summary.jobs_processed, summary.scripts_written, summary.files_created
        );
        for document in &summary.documents {
            eprintln!("             {}", document.display());
        }
    }

    Ok(0)
}
