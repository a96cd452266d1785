//! `weave graph`: print the document/script dependency graph as DOT.

use weave_graph::generate_dependency_graph;

use crate::pipeline::{exit_code, load_config, resolve_input_dir, EXIT_MISCONFIGURED};
use crate::{GlobalArgs, GraphArgs};

/// Runs the `weave graph` command.
///
/// Writes DOT text to `--out` or stdout. Returns 2 when the input directory
/// holds no pipeline documents.
pub fn run(args: &GraphArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let input_dir = match load_config(global)
        .and_then(|config| resolve_input_dir(args.input_dir.as_deref(), &config))
    {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };

    let dot = match generate_dependency_graph(&input_dir) {
        Ok(dot) => dot,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_code(e.kind()));
        }
    };
    if dot.is_empty() {
        if !global.quiet {
            eprintln!(
                "warning: no pipeline documents found in {}",
                input_dir.display()
            );
        }
        return Ok(EXIT_MISCONFIGURED);
    }

    match args.output {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &dot)?;
            if !global.quiet {
                eprintln!("     Wrote dependency graph to {}", path.display());
            }
        }
        None => print!("{dot}"),
    }

    Ok(0)
}
