//! A structure-preserving view of pipeline documents.
//!
//! Documents are kept as their original lines, split into top-level
//! [`Section`]s and, inside jobs, child sections. Only sections that are
//! actually rewritten are re-rendered; every other byte (comments, quoting,
//! anchors, blank lines) passes through untouched. Script-bearing fields are
//! decoded into [`ScriptNode`]s that remember whether an item was a plain
//! string, a comment-bearing item, or a tagged/structured value.

#![warn(missing_docs)]

pub mod document;
pub mod error;
pub mod layout;
mod lines;
pub mod normalize;
pub mod scalar;
pub mod script_field;
pub mod variables;

pub use document::{Document, PRIORITY_KEYS};
pub use error::YamlError;
pub use layout::{split_mapping, Piece, Section};
pub use normalize::{canonical_form, structurally_equal, validate_structure};
pub use scalar::{render_block_literal, render_quoted_multiline, render_scalar};
pub use script_field::{FieldShape, ScriptField, ScriptNode, SCRIPT_KEYS};
pub use variables::{add_variables, new_variables_section, read_variables, VariablesView};
