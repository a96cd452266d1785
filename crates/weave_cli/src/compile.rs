//! `weave compile`: inline referenced scripts into pipeline documents.
//!
//! Resolves the effective options (flags over `WEAVE_*` over `weave.toml`),
//! runs the parallel compile driver, and prints a one-line summary.

use tracing::debug;
use weave_compile::run_compile;
use weave_config::{resolve_compile, CompileOverrides};

use crate::pipeline::{compile_exit_code, exit_code, load_config, report_compile_error};
use crate::{CompileArgs, GlobalArgs};

/// Runs the `weave compile` command.
///
/// Returns 0 on success (including dry runs and runs with nothing to do),
/// 2 when there is nothing to compile or the configuration is bad, and 1
/// when a document failed to compile.
pub fn run(args: &CompileArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = match load_config(global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };

    let overrides = CompileOverrides {
        input_dir: args.input_dir.clone(),
        output_dir: args.output_dir.clone(),
        dry_run: args.dry_run,
        force: args.force,
        parallelism: args.parallelism,
    };
    let options = match resolve_compile(&config, &overrides) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };

    debug!(
        parallelism = options.parallelism,
        force = options.force,
        dry_run = options.dry_run,
        "resolved compile options"
    );
    if !global.quiet {
        eprintln!(
            "   Compiling {} -> {}",
            options.input_dir.display(),
            options.output_dir.display()
        );
    }

    let summary = match run_compile(&options) {
        Ok(summary) => summary,
        Err(e) => {
            report_compile_error(&e);
            return Ok(compile_exit_code(&e));
        }
    };

    if !global.quiet {
        if summary.skipped {
            eprintln!("    Finished no input changed since the last compile");
        } else if options.dry_run {
            eprintln!(
                "    Finished dry run: {} of {} documents would be written, {} scripts inlined",
                summary.would_write, summary.documents, summary.inlined
            );
        } else {
            eprintln!(
                "    Finished {} documents ({} written, {} unchanged), {} scripts inlined",
                summary.documents, summary.written, summary.unchanged, summary.inlined
            );
        }
        if !summary.refused.is_empty() {
            eprintln!(
                "warning: {} reference(s) outside the scripts root were left as-is",
                summary.refused.len()
            );
        }
    }

    Ok(0)
}
