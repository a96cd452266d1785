//! Script-bearing fields (`script`, `before_script`, `after_script`).

use serde_yaml::Value;

use crate::layout::Section;
use crate::lines::{dedent, find_comment, indent_of, is_blank, is_comment, is_sequence_item, opens_block_scalar};
use crate::scalar::{render_block_literal, render_quoted_multiline, render_scalar};

/// Keys whose values are shell command lists.
pub const SCRIPT_KEYS: [&str; 3] = ["before_script", "script", "after_script"];

/// One element of a script field, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptNode {
    /// A plain string command.
    Text(String),
    /// An item that carries a YAML comment, or a standalone comment line
    /// between items (`text` is `None` then). Rendered from `raw`.
    Commented {
        /// The item's string value.
        text: Option<String>,
        /// Original lines, dedented to the item column.
        raw: Vec<String>,
    },
    /// A tagged or structured item, kept exactly as written.
    Raw(Vec<String>),
    /// A `!reference [job, field]` node.
    Reference {
        /// Referenced job.
        job: String,
        /// Referenced field of that job.
        field: String,
    },
}

impl ScriptNode {
    /// The text pragmas should be matched against.
    pub fn pragma_text(&self) -> Option<String> {
        match self {
            ScriptNode::Text(s) => Some(s.clone()),
            ScriptNode::Commented { raw, .. } => Some(raw.join("\n")),
            ScriptNode::Raw(_) | ScriptNode::Reference { .. } => None,
        }
    }

    /// The command string this node runs, if it is a string item.
    pub fn command(&self) -> Option<&str> {
        match self {
            ScriptNode::Text(s) => Some(s),
            ScriptNode::Commented { text, .. } => text.as_deref(),
            ScriptNode::Raw(_) | ScriptNode::Reference { .. } => None,
        }
    }

    /// `true` for a plain string that may be merged with its neighbours.
    pub fn is_plain(&self) -> bool {
        matches!(self, ScriptNode::Text(_))
    }
}

/// How the field was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// `key: value` or a block scalar.
    Scalar,
    /// A block sequence whose `-` sits at `item_indent`.
    Sequence {
        /// Column of the dash.
        item_indent: usize,
    },
    /// `key: [a, b]`.
    Flow,
}

/// A decoded script field.
#[derive(Debug, Clone)]
pub struct ScriptField {
    key_prefix: String,
    key_comment: Option<String>,
    indent: usize,
    /// Original layout.
    pub shape: FieldShape,
    /// Decoded items.
    pub nodes: Vec<ScriptNode>,
}

impl ScriptField {
    /// Decodes `section` as a script field.
    ///
    /// Returns `None` for values that cannot be rewritten safely: nulls,
    /// aliases, tagged scalars, mappings, or anything whose items do not
    /// line up with what the YAML parser sees.
    pub fn parse(section: &Section) -> Option<ScriptField> {
        let mut field = ScriptField {
            key_prefix: section.key_prefix().to_string(),
            key_comment: section.key_comment().map(String::from),
            indent: section.indent(),
            shape: FieldShape::Scalar,
            nodes: Vec::new(),
        };

        match section.inline_value() {
            Some(v) if v.starts_with('[') => {
                let Value::Sequence(items) = section.parse_value().ok()? else {
                    return None;
                };
                field.shape = FieldShape::Flow;
                for item in items {
                    match item {
                        Value::String(s) => field.nodes.push(ScriptNode::Text(s)),
                        _ => return None,
                    }
                }
            }
            Some(v) if v.starts_with(&['!', '*', '&'][..]) => return None,
            Some(_) => {
                let Value::String(s) = section.parse_value().ok()? else {
                    return None;
                };
                field.nodes.push(ScriptNode::Text(s));
            }
            None => {
                let (item_indent, nodes, count) = parse_sequence(section.body())?;
                let Value::Sequence(items) = section.parse_value().ok()? else {
                    return None;
                };
                if count != items.len() {
                    return None;
                }
                field.shape = FieldShape::Sequence { item_indent };
                field.nodes = nodes;
            }
        }
        Some(field)
    }

    /// Renders the field with `nodes` as its new value.
    pub fn render(&self, nodes: &[ScriptNode]) -> Vec<String> {
        let content_indent = self.indent + 2;
        if let [ScriptNode::Text(s)] = nodes {
            if s.contains('\n') {
                let head = format!("{} ", self.key_prefix);
                return render_block_literal(&head, s, content_indent).unwrap_or_else(|| {
                    vec![format!("{head}{}", render_quoted_multiline(s))]
                });
            }
            if self.shape == FieldShape::Scalar {
                return vec![format!("{} {}", self.key_prefix, render_scalar(s))];
            }
        }

        let item_indent = match self.shape {
            FieldShape::Sequence { item_indent } => item_indent,
            _ => content_indent,
        };
        let pad = " ".repeat(item_indent);
        let mut out = vec![match &self.key_comment {
            Some(c) => format!("{} {c}", self.key_prefix),
            None => self.key_prefix.clone(),
        }];
        for node in nodes {
            match node {
                ScriptNode::Text(s) if s.contains('\n') => {
                    let head = format!("{pad}- ");
                    match render_block_literal(&head, s, item_indent + 2) {
                        Some(lines) => out.extend(lines),
                        None => out.push(format!("{head}{}", render_quoted_multiline(s))),
                    }
                }
                ScriptNode::Text(s) => out.push(format!("{pad}- {}", render_scalar(s))),
                ScriptNode::Commented { raw, .. } | ScriptNode::Raw(raw) => {
                    out.extend(raw.iter().map(|l| {
                        if l.is_empty() {
                            String::new()
                        } else {
                            format!("{pad}{l}")
                        }
                    }));
                }
                ScriptNode::Reference { job, field } => out.push(format!(
                    "{pad}- !reference [{}, {}]",
                    flow_scalar(job),
                    flow_scalar(field)
                )),
            }
        }
        out
    }
}

fn flow_scalar(s: &str) -> String {
    let rendered = render_scalar(s);
    if rendered.starts_with(&['\'', '"'][..]) || !s.contains(&[',', '[', ']', '{', '}'][..]) {
        rendered
    } else {
        format!("'{}'", s.replace('\'', "''"))
    }
}

/// Splits a block sequence into nodes. Also returns the dash column and the
/// number of YAML items seen.
fn parse_sequence(body: &[String]) -> Option<(usize, Vec<ScriptNode>, usize)> {
    let first = body.iter().find(|l| !is_blank(l) && !is_comment(l))?;
    if !is_sequence_item(first) {
        return None;
    }
    let item_indent = indent_of(first);

    let mut nodes = Vec::new();
    let mut chunk: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut count = 0;

    let flush_pending = |pending: &mut Vec<String>, nodes: &mut Vec<ScriptNode>| {
        for line in pending.drain(..) {
            nodes.push(ScriptNode::Commented {
                text: None,
                raw: dedent(std::slice::from_ref(&line), item_indent),
            });
        }
    };

    for line in body {
        let indent = indent_of(line);
        if is_blank(line) {
            pending.push(line.clone());
        } else if indent > item_indent {
            if chunk.is_empty() {
                return None;
            }
            chunk.append(&mut pending);
            chunk.push(line.clone());
        } else if is_comment(line) {
            if !chunk.is_empty() {
                nodes.push(decode_item(&chunk, item_indent)?);
                count += 1;
                chunk.clear();
            }
            pending.push(line.clone());
        } else if indent == item_indent && is_sequence_item(line) {
            if !chunk.is_empty() {
                nodes.push(decode_item(&chunk, item_indent)?);
                count += 1;
                chunk.clear();
            }
            flush_pending(&mut pending, &mut nodes);
            chunk.push(line.clone());
        } else {
            return None;
        }
    }
    if !chunk.is_empty() {
        nodes.push(decode_item(&chunk, item_indent)?);
        count += 1;
    }
    flush_pending(&mut pending, &mut nodes);
    Some((item_indent, nodes, count))
}

fn decode_item(chunk: &[String], item_indent: usize) -> Option<ScriptNode> {
    let raw = dedent(chunk, item_indent);
    let mut text = raw.join("\n");
    text.push('\n');
    let mut items: Vec<Value> = serde_yaml::from_str(&text).ok()?;
    if items.len() != 1 {
        return None;
    }
    match items.remove(0) {
        Value::String(s) => {
            let header = raw[0].trim_start().trim_start_matches('-');
            let commented = if opens_block_scalar(&raw[0]) {
                find_comment(header).is_some()
            } else {
                raw.iter()
                    .enumerate()
                    .any(|(i, l)| find_comment(if i == 0 { header } else { l }).is_some())
            };
            Some(if commented {
                ScriptNode::Commented { text: Some(s), raw }
            } else {
                ScriptNode::Text(s)
            })
        }
        Value::Null if raw.len() == 1 && find_comment(&raw[0]).is_some() => {
            Some(ScriptNode::Commented { text: None, raw })
        }
        _ => Some(ScriptNode::Raw(raw)),
    }
}
