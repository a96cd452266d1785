//! Source tree scanning for weave.
//!
//! Builds the [`ScriptSourceMap`] once per compilation run and discovers the
//! pipeline documents and script files that the compiler and the dependency
//! graph builder walk.

#![warn(missing_docs)]

pub mod discover;
pub mod error;
pub mod source_file;
pub mod source_map;

pub use discover::{discover_documents, discover_files, is_document_file, is_script_file};
pub use error::SourceError;
pub use source_file::SourceFile;
pub use source_map::ScriptSourceMap;
