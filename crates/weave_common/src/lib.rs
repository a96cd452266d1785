//! Shared foundational types used across the weave pipeline compiler.
//!
//! This crate provides the content hash used for change and drift tracking,
//! lexical path helpers enforcing the containment boundary, and the error
//! taxonomy every other crate maps its failures onto.

#![warn(missing_docs)]

pub mod hash;
pub mod paths;
pub mod result;

pub use hash::{ContentHash, HashDecodeError};
pub use paths::{is_within, normalize_lexically, relative_slash, to_slash};
pub use result::{ErrorKind, RESERVED_DIR};
