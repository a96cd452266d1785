//! Weave CLI, the command-line interface for the weave pipeline compiler.
//!
//! Provides `weave compile` to inline scripts into pipeline documents,
//! `weave decompile` to extract them back out, `weave graph` for the
//! document/script dependency graph, `weave detect-drift` to find generated
//! files that were edited by hand, and `weave clean` to remove outputs.

#![warn(missing_docs)]

mod clean;
mod compile;
mod decompile;
mod drift;
mod graph;
mod pipeline;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Weave compiles shell scripts into CI pipeline documents.
#[derive(Parser, Debug)]
#[command(name = "weave", version, about = "CI pipeline script compiler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `weave.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inline referenced scripts into pipeline documents.
    Compile(CompileArgs),
    /// Extract script blocks from pipeline documents into files.
    Decompile(DecompileArgs),
    /// Print the document/script dependency graph as DOT.
    Graph(GraphArgs),
    /// Report generated files that changed since they were compiled.
    DetectDrift(DriftArgs),
    /// Remove generated files that were not edited by hand.
    Clean(CleanArgs),
}

/// Arguments for the `weave compile` subcommand.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Directory holding uncompiled documents and scripts.
    #[arg(long = "in", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory that receives compiled documents.
    #[arg(long = "out", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Compute everything but write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Recompile even when no input changed, and overwrite hand-edited outputs.
    #[arg(long)]
    pub force: bool,

    /// Number of documents compiled at once.
    #[arg(long, value_name = "N")]
    pub parallelism: Option<usize>,
}

/// Arguments for the `weave decompile` subcommand.
#[derive(Parser, Debug)]
pub struct DecompileArgs {
    /// A single document or a directory of documents.
    #[arg(long = "in", value_name = "PATH")]
    pub input: PathBuf,

    /// Directory that receives the rewritten documents and extracted scripts.
    #[arg(long = "out", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Report what would be written without touching the disk.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `weave graph` subcommand.
#[derive(Parser, Debug)]
pub struct GraphArgs {
    /// Directory holding uncompiled documents and scripts.
    #[arg(long = "in", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// File that receives the DOT text (default: stdout).
    #[arg(long = "out", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `weave detect-drift` subcommand.
#[derive(Parser, Debug)]
pub struct DriftArgs {
    /// Directory holding compiled documents.
    #[arg(long = "out", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the `weave clean` subcommand.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Directory holding compiled documents.
    #[arg(long = "out", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// List what would be removed without removing it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => pipeline::stdout_is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    pipeline::init_logging(&global);

    let result = match cli.command {
        Command::Compile(ref args) => compile::run(args, &global),
        Command::Decompile(ref args) => decompile::run(args, &global),
        Command::Graph(ref args) => graph::run(args, &global),
        Command::DetectDrift(ref args) => drift::run(args, &global),
        Command::Clean(ref args) => clean::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_compile_default() {
        let cli = Cli::parse_from(["weave", "compile"]);
        match cli.command {
            Command::Compile(ref args) => {
                assert!(args.input_dir.is_none());
                assert!(args.output_dir.is_none());
                assert!(!args.dry_run);
                assert!(!args.force);
                assert!(args.parallelism.is_none());
            }
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn parse_compile_with_args() {
        let cli = Cli::parse_from([
            "weave",
            "compile",
            "--in",
            "src",
            "--out",
            "out",
            "--dry-run",
            "--force",
            "--parallelism",
            "4",
        ]);
        match cli.command {
            Command::Compile(ref args) => {
                assert_eq!(args.input_dir.as_deref(), Some(std::path::Path::new("src")));
                assert_eq!(args.output_dir.as_deref(), Some(std::path::Path::new("out")));
                assert!(args.dry_run);
                assert!(args.force);
                assert_eq!(args.parallelism, Some(4));
            }
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn parse_decompile() {
        let cli = Cli::parse_from([
            "weave",
            "decompile",
            "--in",
            ".gitlab-ci.yml",
            "--out",
            "decompiled",
        ]);
        match cli.command {
            Command::Decompile(ref args) => {
                assert_eq!(args.input, PathBuf::from(".gitlab-ci.yml"));
                assert_eq!(args.output_dir, PathBuf::from("decompiled"));
                assert!(!args.dry_run);
            }
            _ => panic!("expected Decompile command"),
        }
    }

    #[test]
    fn decompile_requires_paths() {
        assert!(Cli::try_parse_from(["weave", "decompile", "--in", "ci.yml"]).is_err());
    }

    #[test]
    fn parse_graph_to_file() {
        let cli = Cli::parse_from(["weave", "graph", "--in", "src", "--out", "deps.dot"]);
        match cli.command {
            Command::Graph(ref args) => {
                assert_eq!(args.input_dir, Some(PathBuf::from("src")));
                assert_eq!(args.output, Some(PathBuf::from("deps.dot")));
            }
            _ => panic!("expected Graph command"),
        }
    }

    #[test]
    fn parse_detect_drift() {
        let cli = Cli::parse_from(["weave", "detect-drift", "--out", "out"]);
        match cli.command {
            Command::DetectDrift(ref args) => {
                assert_eq!(args.output_dir, Some(PathBuf::from("out")));
            }
            _ => panic!("expected DetectDrift command"),
        }
    }

    #[test]
    fn parse_clean_dry_run() {
        let cli = Cli::parse_from(["weave", "clean", "--out", "out", "--dry-run"]);
        match cli.command {
            Command::Clean(ref args) => {
                assert_eq!(args.output_dir, Some(PathBuf::from("out")));
                assert!(args.dry_run);
            }
            _ => panic!("expected Clean command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["weave", "--quiet", "--color", "never", "compile"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["weave", "graph", "--verbose", "--color", "always"]);
        assert!(cli.verbose);
        assert_eq!(cli.color, ColorChoice::Always);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["weave", "--config", "/path/to/weave.toml", "compile"]);
        assert_eq!(cli.config.as_deref(), Some("/path/to/weave.toml"));
    }

    #[test]
    fn rejects_non_numeric_parallelism() {
        assert!(Cli::try_parse_from(["weave", "compile", "--parallelism", "many"]).is_err());
    }
}
