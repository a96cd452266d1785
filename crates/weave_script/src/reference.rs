//! The safe reference parser.
//!
//! A line is a script reference only when it is *exactly* an invocation of
//! one script file: optionally through a shell executor or a dot-source
//! alias, with no flags, no extra arguments, and no leading assignments.
//! Anything looser returns `None`, since inlining would change how
//! arguments reach the script.

use crate::tokenize::split_words;
use crate::variables::is_identifier;

/// Shell executors accepted in front of a script path.
const EXECUTORS: &[&str] = &["bash", "sh", "pwsh"];

/// Dot-source aliases accepted in front of a script path.
const DOT_SOURCE: &[&str] = &["source", "."];

/// Suffixes that mark a token as a script path (compared case-insensitively).
const SCRIPT_SUFFIXES: &[&str] = &[".sh", ".ps1", ".bash"];

/// How the script was invoked on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationHint {
    /// The path alone, e.g. `./build.sh`.
    Direct,
    /// Through a shell executor, e.g. `bash build.sh`.
    Executor(String),
    /// Through `source` or `.`.
    DotSource,
}

/// A line recognized as exactly one script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReference {
    /// The line as written, trimmed.
    pub raw: String,
    /// Slash-separated path with any leading `./` removed.
    pub path: String,
    /// How the script was invoked.
    pub hint: InvocationHint,
}

/// Returns the normalized script path if `line` is exactly a script invocation.
pub fn extract_script_path(line: &str) -> Option<String> {
    parse_reference(line).map(|r| r.path)
}

/// Parses `line` into a [`ScriptReference`] if it is exactly a script invocation.
pub fn parse_reference(line: &str) -> Option<ScriptReference> {
    let words = split_words(line)?;
    let first = words.first()?;
    if is_assignment(first) {
        return None;
    }

    let (script, hint) = match words.as_slice() {
        [only] if is_script_token(only) => (only, InvocationHint::Direct),
        [exe, script] if EXECUTORS.contains(&exe.as_str()) && is_script_token(script) => {
            (script, InvocationHint::Executor(exe.clone()))
        }
        [alias, script] if DOT_SOURCE.contains(&alias.as_str()) && is_script_token(script) => {
            (script, InvocationHint::DotSource)
        }
        _ => return None,
    };

    Some(ScriptReference {
        raw: line.trim().to_string(),
        path: normalize_path(script),
        hint,
    })
}

fn is_assignment(word: &str) -> bool {
    word.split_once('=')
        .is_some_and(|(name, _)| is_identifier(name))
}

fn is_script_token(word: &str) -> bool {
    if word.starts_with('-') {
        return false;
    }
    let lower = word.to_ascii_lowercase();
    SCRIPT_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Converts backslashes, drops leading `./`, and collapses doubled
/// separators (a leading `//` is kept for UNC paths).
fn normalize_path(word: &str) -> String {
    let slashed = word.replace('\\', "/");
    let (unc, rest) = match slashed.strip_prefix("//") {
        Some(rest) => ("//", rest),
        None => ("", slashed.as_str()),
    };
    let mut parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
    while parts.len() > 1 && parts[0] == "." {
        parts.remove(0);
    }
    let leading_root = if unc.is_empty() && rest.starts_with('/') { "/" } else { "" };
    format!("{unc}{leading_root}{}", parts.join("/"))
}
