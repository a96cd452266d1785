//! The weave compiler.
//!
//! Turns a tree of pipeline templates and the scripts they call into
//! self-contained pipeline documents: script references are replaced by the
//! script bodies, interpreter invocations by inline programs, and
//! `inline-artifact` pragmas by encoded archives with extraction shims.
//! [`decompile`] runs the other way.

#![warn(missing_docs)]

pub mod artifact;
pub mod banner;
pub mod decompile;
pub mod driver;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod shell;
pub mod writer;

pub use artifact::{ArtifactPackager, ArtifactShim, ARTIFACT_VAR};
pub use banner::banner_lines;
pub use decompile::{create_script_filename, run_decompile, DecompileSummary};
pub use driver::{run_compile, run_compile_with_store, CompileSummary};
pub use engine::{collapse, CompiledDocument, Inliner, COLLAPSE_THRESHOLD};
pub use error::CompileError;
pub use interpreter::{InterpreterOffer, InterpreterPackager, InterpreterShim};
pub use shell::{shell_quote, single_quote};
pub use writer::{write_compiled_file, WriteOutcome};
