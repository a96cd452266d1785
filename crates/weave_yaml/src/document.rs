//! Whole pipeline documents.

use tracing::debug;

use crate::error::YamlError;
use crate::layout::{find_section, find_section_mut, split_mapping, Piece, Section};
use crate::lines::is_document_marker;
use crate::normalize::validate_structure;

/// Top-level keys moved to the front of a compiled document, in this order.
pub const PRIORITY_KEYS: [&str; 3] = ["include", "variables", "stages"];

/// A parsed pipeline document that renders back to its original text.
#[derive(Debug, Clone)]
pub struct Document {
    pieces: Vec<Piece>,
    multi_doc: bool,
    opaque: bool,
}

impl Document {
    /// Validates `text` as YAML and splits it into top-level sections.
    ///
    /// A document whose root is not a block mapping is kept verbatim and
    /// exposes no sections.
    pub fn parse(text: &str) -> Result<Document, YamlError> {
        validate_structure(text)?;
        let text = text.replace("\r\n", "\n");
        let lines: Vec<String> = text.lines().map(String::from).collect();
        let markers = lines
            .iter()
            .filter(|l| is_document_marker(l))
            .count();
        let multi_doc = markers > 1 || lines.iter().any(|l| l.starts_with("..."));
        match split_mapping(&lines) {
            Some(pieces) => Ok(Document {
                pieces,
                multi_doc,
                opaque: false,
            }),
            None => {
                debug!("document root is not a block mapping; leaving it untouched");
                Ok(Document {
                    pieces: vec![Piece::Gap(lines)],
                    multi_doc,
                    opaque: true,
                })
            }
        }
    }

    /// `true` when the root could not be split into sections.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// `true` when the text holds more than one YAML document.
    pub fn is_multi_doc(&self) -> bool {
        self.multi_doc
    }

    /// Top-level pieces in order.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Top-level sections in order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Section(s) => Some(s),
            Piece::Gap(_) => None,
        })
    }

    /// Top-level sections in order, for modification.
    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.pieces.iter_mut().filter_map(|p| match p {
            Piece::Section(s) => Some(s),
            Piece::Gap(_) => None,
        })
    }

    /// Looks up a top-level section.
    pub fn section(&self, key: &str) -> Option<&Section> {
        find_section(&self.pieces, key)
    }

    /// Looks up a top-level section for modification.
    pub fn section_mut(&mut self, key: &str) -> Option<&mut Section> {
        find_section_mut(&mut self.pieces, key)
    }

    /// Appends a section at the end of the document.
    pub fn push_section(&mut self, section: Section) {
        self.pieces.push(Piece::Section(section));
    }

    /// Removes a top-level section and returns it.
    pub fn remove_section(&mut self, key: &str) -> Option<Section> {
        let at = self
            .pieces
            .iter()
            .position(|p| matches!(p, Piece::Section(s) if s.key() == key))?;
        match self.pieces.remove(at) {
            Piece::Section(s) => Some(s),
            Piece::Gap(_) => None,
        }
    }

    /// Moves the `keys` sections to the front, in the given order.
    ///
    /// A leading header gap stays first; any other gap travels with the
    /// section that follows it. Multi-document files are left alone.
    /// Returns `true` if the order changed.
    pub fn hoist_keys(&mut self, keys: &[&str]) -> bool {
        if self.multi_doc || self.opaque {
            return false;
        }
        let rank = |s: &Section| {
            keys.iter()
                .position(|k| *k == s.key())
                .unwrap_or(keys.len())
        };

        let mut pieces = std::mem::take(&mut self.pieces).into_iter().peekable();
        let header = match pieces.peek() {
            Some(Piece::Gap(_)) => pieces.next(),
            _ => None,
        };

        let mut units: Vec<(Option<Piece>, Section)> = Vec::new();
        let mut trailer = None;
        let mut gap = None;
        for piece in pieces {
            match piece {
                Piece::Gap(_) => gap = Some(piece),
                Piece::Section(s) => units.push((gap.take(), s)),
            }
        }
        if gap.is_some() {
            trailer = gap;
        }

        let before: Vec<usize> = units.iter().map(|(_, s)| rank(s)).collect();
        units.sort_by_key(|(_, s)| rank(s));
        let changed = units.iter().map(|(_, s)| rank(s)).collect::<Vec<_>>() != before;

        self.pieces.extend(header);
        for (gap, section) in units {
            self.pieces.extend(gap);
            self.pieces.push(Piece::Section(section));
        }
        self.pieces.extend(trailer);
        changed
    }

    /// Renders the document, always ending with a newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.pieces.iter().flat_map(|p| p.lines()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Prepends comment lines above everything else.
    pub fn prepend_lines(&mut self, lines: Vec<String>) {
        if !lines.is_empty() {
            self.pieces.insert(0, Piece::Gap(lines));
        }
    }
}
