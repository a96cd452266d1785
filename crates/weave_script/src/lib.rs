//! Line-level understanding of shell scripts for weave.
//!
//! This crate answers the per-line questions the compiler and the graph
//! builder ask: is this line exactly a script invocation ([`parse_reference`]),
//! does it carry a pragma ([`classify_lines`]), and what does a script look
//! like once its own `source` lines are spliced in ([`ScriptReader`]). It also
//! owns the `KEY=VALUE` variable file format and the [`VariableSet`] merge.

#![warn(missing_docs)]

pub mod error;
pub mod pragma;
pub mod reader;
pub mod reference;
pub mod tokenize;
pub mod variables;

pub use error::ScriptError;
pub use pragma::{
    classify_lines, find_pragma, parse_artifact_pragma, ArchiveFormat, ArtifactDirective,
    LineClass, PragmaCommand,
};
pub use reader::{strip_preamble, ScriptReader, INLINE_BEGIN, INLINE_END};
pub use reference::{extract_script_path, parse_reference, InvocationHint, ScriptReference};
pub use tokenize::split_words;
pub use variables::{
    is_identifier, job_variable_file_name, load_variable_file, parse_variable_file, VariableSet,
    GLOBAL_VARIABLES_FILE,
};
