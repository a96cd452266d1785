//! Splitting block mappings into keyed sections without re-serializing them.
//!
//! A [`Section`] owns its key line plus every following line that belongs to
//! it: deeper-indented content, block scalar bodies, and comments or blank
//! lines that sit between its own content lines. Comments and blank lines
//! that precede the next key are kept as a separate [`Piece::Gap`].

use crate::error::YamlError;
use crate::lines::{
    dedent, find_comment, indent_of, is_blank, is_comment, is_document_marker, is_sequence_item,
    key_end, mapping_key, opens_block_scalar,
};

/// One keyed entry of a block mapping, as its original lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    key: String,
    lines: Vec<String>,
}

/// A run of lines between sections, or a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Blank lines, comments and document markers.
    Gap(Vec<String>),
    /// A mapping entry.
    Section(Section),
}

impl Piece {
    /// The lines this piece renders to.
    pub fn lines(&self) -> &[String] {
        match self {
            Piece::Gap(lines) => lines,
            Piece::Section(s) => &s.lines,
        }
    }
}

impl Section {
    /// Builds a section from its key line and body lines.
    pub fn new(key_line: impl Into<String>, body: Vec<String>) -> Option<Section> {
        let key_line = key_line.into();
        let key = mapping_key(&key_line)?;
        let mut lines = Vec::with_capacity(body.len() + 1);
        lines.push(key_line);
        lines.extend(body);
        Some(Section { key, lines })
    }

    pub(crate) fn with_key(key: &str, key_line: String, body: Vec<String>) -> Section {
        let mut lines = vec![key_line];
        lines.extend(body);
        Section {
            key: key.to_string(),
            lines,
        }
    }

    /// The mapping key, unquoted.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All lines including the key line.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines after the key line.
    pub fn body(&self) -> &[String] {
        &self.lines[1..]
    }

    /// The key line up to and including the key's colon.
    pub fn key_prefix(&self) -> &str {
        let line = &self.lines[0];
        key_end(line).map_or(line.as_str(), |end| &line[..end])
    }

    /// Column of the key.
    pub fn indent(&self) -> usize {
        indent_of(&self.lines[0])
    }

    /// The value written on the key line itself, without any comment.
    pub fn inline_value(&self) -> Option<&str> {
        let line = &self.lines[0];
        let rest = &line[key_end(line)?..];
        let rest = match find_comment(rest) {
            Some(at) => &rest[..at],
            None => rest,
        };
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    }

    /// The comment on the key line, if any, including the `#`.
    pub fn key_comment(&self) -> Option<&str> {
        let line = &self.lines[0];
        let end = key_end(line)?;
        let rest = &line[end..];
        find_comment(rest).map(|at| rest[at..].trim_end())
    }

    /// Splits the body into child sections when the value is a block mapping.
    ///
    /// Returns `None` when the value is written inline (other than a bare
    /// anchor) or when the body is not a block mapping.
    pub fn children(&self) -> Option<Vec<Piece>> {
        if let Some(v) = self.inline_value() {
            let bare_anchor = v.starts_with('&') && !v.contains(char::is_whitespace);
            if !bare_anchor {
                return None;
            }
        }
        split_mapping(self.body())
    }

    /// Replaces the body with the rendered `children`.
    pub fn set_children(&mut self, children: &[Piece]) {
        let body = children.iter().flat_map(|p| p.lines().iter().cloned()).collect();
        self.replace_body(body);
    }

    /// Replaces every line after the key line.
    pub fn replace_body(&mut self, body: Vec<String>) {
        self.lines.truncate(1);
        self.lines.extend(body);
    }

    /// Replaces the whole section, key line included.
    pub fn replace_all(&mut self, key_line: String, body: Vec<String>) {
        self.lines.clear();
        self.lines.push(key_line);
        self.lines.extend(body);
    }

    /// Parses this section's value with the YAML parser.
    pub fn parse_value(&self) -> Result<serde_yaml::Value, YamlError> {
        let text = dedent(&self.lines, self.indent()).join("\n");
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(&text)?;
        Ok(mapping
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .unwrap_or(serde_yaml::Value::Null))
    }
}

/// Finds a section by key.
pub fn find_section<'a>(pieces: &'a [Piece], key: &str) -> Option<&'a Section> {
    pieces.iter().find_map(|p| match p {
        Piece::Section(s) if s.key == key => Some(s),
        _ => None,
    })
}

/// Finds a section by key for modification.
pub fn find_section_mut<'a>(pieces: &'a mut [Piece], key: &str) -> Option<&'a mut Section> {
    pieces.iter_mut().find_map(|p| match p {
        Piece::Section(s) if s.key == key => Some(s),
        _ => None,
    })
}

/// Splits `lines` into the entries of a block mapping.
///
/// The mapping's indent is taken from the first significant line, which must
/// be a key. Returns `None` when the lines are not a block mapping.
pub fn split_mapping(lines: &[String]) -> Option<Vec<Piece>> {
    let base = lines
        .iter()
        .find(|l| !is_gap_line(l))
        .map(|l| indent_of(l));
    let Some(base) = base else {
        return Some(if lines.is_empty() {
            Vec::new()
        } else {
            vec![Piece::Gap(lines.to_vec())]
        });
    };

    let mut pieces = Vec::new();
    let mut current: Option<Section> = None;
    let mut pending: Vec<String> = Vec::new();
    let mut block_floor: Option<usize> = None;

    for line in lines {
        let indent = indent_of(line);
        if let Some(floor) = block_floor {
            if is_blank(line) {
                pending.push(line.clone());
                continue;
            }
            if indent > floor {
                let section = current.as_mut()?;
                section.lines.append(&mut pending);
                section.lines.push(line.clone());
                continue;
            }
            block_floor = None;
        }

        if is_gap_line(line) {
            pending.push(line.clone());
            continue;
        }

        let continues = indent > base || (indent == base && is_sequence_item(line));
        if continues {
            let section = current.as_mut()?;
            section.lines.append(&mut pending);
            section.lines.push(line.clone());
        } else if indent == base {
            let key = mapping_key(line)?;
            if let Some(done) = current.take() {
                pieces.push(Piece::Section(done));
            }
            if !pending.is_empty() {
                pieces.push(Piece::Gap(std::mem::take(&mut pending)));
            }
            current = Some(Section {
                key,
                lines: vec![line.clone()],
            });
        } else {
            return None;
        }

        if opens_block_scalar(line) {
            block_floor = Some(indent);
        }
    }

    if let Some(done) = current {
        pieces.push(Piece::Section(done));
    }
    if !pending.is_empty() {
        pieces.push(Piece::Gap(pending));
    }
    Some(pieces)
}

fn is_gap_line(line: &str) -> bool {
    is_blank(line) || is_comment(line) || is_document_marker(line) || line.starts_with('%')
}
