//! The error taxonomy shared by every weave crate.

use std::fmt;

/// Name of the reserved state directory kept under both the input and the
/// output tree.
pub const RESERVED_DIR: &str = ".weave";

/// Broad category of a user-facing failure.
///
/// Each crate keeps its own error enum with precise context; `kind()` on
/// those enums maps them onto this taxonomy, which drives exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A missing input file or directory, or a missing referenced script.
    NotFound,
    /// A path escaped the containment boundary.
    Security,
    /// The produced document failed structural validation.
    Validation,
    /// A failure during substitution or writing.
    Compile,
    /// A malformed variable file, pragma argument, or config value.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Security => "security",
            ErrorKind::Validation => "validation",
            ErrorKind::Compile => "compile",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}
