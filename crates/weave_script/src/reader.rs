//! Script bodies with their nested `source` lines spliced in.
//!
//! A script referenced from a document may itself `source` other scripts.
//! [`ScriptReader::expand`] walks those with an explicit frame stack; the set
//! of scripts currently on the stack detects cycles.

use std::path::Path;

use tracing::{debug, error, warn};
use weave_common::{normalize_lexically, to_slash};
use weave_source::ScriptSourceMap;

use crate::error::ScriptError;
use crate::pragma::{classify_lines, LineClass};
use crate::reference::{parse_reference, InvocationHint};

/// Opening marker written before spliced content, followed by the reference.
pub const INLINE_BEGIN: &str = "# >>> BEGIN inline:";

/// Closing marker written after spliced content.
pub const INLINE_END: &str = "# <<< END inline";

/// Removes a leading byte-order mark and a shebang line.
pub fn strip_preamble(content: &str) -> &str {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.starts_with("#!") {
        match content.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        }
    } else {
        content
    }
}

struct Frame {
    rel: String,
    lines: Vec<String>,
    classes: Vec<LineClass>,
    next: usize,
}

impl Frame {
    fn open(rel: &str, content: &str) -> Result<Self, ScriptError> {
        let lines: Vec<String> = strip_preamble(content)
            .trim()
            .lines()
            .map(str::to_string)
            .collect();
        let classes = classify_lines(lines.iter().map(String::as_str))?;
        Ok(Self {
            rel: rel.to_string(),
            lines,
            classes,
            next: 0,
        })
    }

    fn dir(&self) -> &Path {
        Path::new(&self.rel).parent().unwrap_or(Path::new(""))
    }
}

/// Reads scripts out of a [`ScriptSourceMap`], expanding nested sources.
pub struct ScriptReader<'a> {
    sources: &'a ScriptSourceMap,
}

impl<'a> ScriptReader<'a> {
    /// Creates a reader over the given source map.
    pub fn new(sources: &'a ScriptSourceMap) -> Self {
        Self { sources }
    }

    /// Returns the lines of the script at `rel`, with every `source x.sh` /
    /// `. x.sh` line that resolves inside the scripts root replaced by the
    /// sourced script wrapped in inline markers.
    ///
    /// `reference` is the text used in error messages. A sourced script that
    /// is not in the map, or that escapes the root, stays as a plain line.
    pub fn expand(&self, rel: &str, reference: &str) -> Result<Vec<String>, ScriptError> {
        let file = self
            .sources
            .get(rel)
            .ok_or_else(|| ScriptError::MissingScript {
                reference: reference.to_string(),
                path: self.sources.root().join(rel),
            })?;
        let root = Frame::open(rel, &file.content)?;
        if root.lines.is_empty() {
            return Err(ScriptError::EmptyScript {
                reference: reference.to_string(),
            });
        }

        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(frame) = stack.last_mut() {
            if frame.next >= frame.lines.len() {
                stack.pop();
                if !stack.is_empty() {
                    out.push(INLINE_END.to_string());
                }
                continue;
            }
            let index = frame.next;
            frame.next += 1;
            let line = &frame.lines[index];

            let LineClass::Normal { allow_outside_root } = frame.classes[index] else {
                out.push(line.clone());
                continue;
            };
            let Some(nested) = parse_reference(line).filter(|r| r.hint == InvocationHint::DotSource)
            else {
                out.push(line.clone());
                continue;
            };

            let Some(target) = resolve_nested(frame.dir(), &nested.path) else {
                if allow_outside_root {
                    debug!(line = %line, "Leaving outside-root source line in place");
                } else {
                    error!(
                        source = %frame.rel,
                        reference = %nested.raw,
                        "Refusing to inline source outside the scripts root"
                    );
                }
                out.push(line.clone());
                continue;
            };
            let Some(file) = self.sources.get(&target) else {
                warn!(source = %frame.rel, reference = %nested.raw, "Sourced script not found; leaving line in place");
                out.push(line.clone());
                continue;
            };

            if stack.iter().any(|f| f.rel == target) {
                let mut chain: Vec<String> = stack.iter().map(|f| f.rel.clone()).collect();
                chain.push(target);
                return Err(ScriptError::SourceCycle { chain });
            }
            out.push(format!("{INLINE_BEGIN} {target}"));
            stack.push(Frame::open(&target, &file.content)?);
        }
        Ok(out)
    }
}

/// Resolves a sourced path against the sourcing script's directory.
///
/// Returns `None` when the result leaves the scripts root.
fn resolve_nested(dir: &Path, path: &str) -> Option<String> {
    if Path::new(path).is_absolute() {
        return None;
    }
    let resolved = normalize_lexically(&dir.join(path));
    let escapes = resolved
        .components()
        .next()
        .is_some_and(|c| matches!(c, std::path::Component::ParentDir));
    (!escapes).then(|| to_slash(&resolved))
}
