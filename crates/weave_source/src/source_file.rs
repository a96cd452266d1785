//! A single loaded script file.

use std::path::PathBuf;

/// A script file loaded into the source map.
///
/// Content is stored with line endings normalized to `\n` and surrounding
/// whitespace trimmed, which is exactly the text spliced into documents.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Slash-separated path relative to the scripts root.
    pub rel_path: String,
    /// Location on disk (or a synthetic name for in-memory sources).
    pub path: PathBuf,
    /// Trimmed file content.
    pub content: String,
}

impl SourceFile {
    /// Creates a source file, normalizing line endings and trimming.
    pub fn new(rel_path: impl Into<String>, path: PathBuf, raw: &str) -> Self {
        Self {
            rel_path: rel_path.into(),
            path,
            content: normalize_text(raw),
        }
    }

    /// Returns `true` if nothing but whitespace was in the file.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Iterates over the content lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines()
    }

    /// Number of lines in the trimmed content.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Normalizes CRLF line endings and trims surrounding whitespace.
pub(crate) fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed_and_normalized() {
        let f = SourceFile::new("a.sh", PathBuf::from("a.sh"), "\r\necho a\r\necho b\r\n\n");
        assert_eq!(f.content, "echo a\necho b");
        assert_eq!(f.line_count(), 2);
        assert_eq!(f.lines().collect::<Vec<_>>(), vec!["echo a", "echo b"]);
    }

    #[test]
    fn whitespace_only_is_empty() {
        let f = SourceFile::new("e.sh", PathBuf::from("e.sh"), "  \n\t\n");
        assert!(f.is_empty());
        assert_eq!(f.line_count(), 0);
    }
}
