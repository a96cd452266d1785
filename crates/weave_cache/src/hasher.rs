//! Normalized content hashing and change detection.
//!
//! Input-side hashes ignore formatting: script-like files hash with all
//! whitespace removed, and YAML files hash their re-serialized structure so
//! that reformatting a document does not trigger a recompile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use weave_common::ContentHash;
use weave_yaml::canonical_form;

use crate::error::CacheError;

/// Result of comparing current source hashes against the stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files with no stored record.
    pub new_files: Vec<PathBuf>,

    /// Files whose hash differs from the record, or whose record is unreadable.
    pub modified_files: Vec<PathBuf>,

    /// Files with a record but no longer on disk.
    pub deleted_files: Vec<PathBuf>,

    /// Files whose hash matches the record.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if there are no new, modified, or deleted files.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// Every path that is new, modified or deleted, sorted.
    pub fn changed(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self
            .new_files
            .iter()
            .chain(&self.modified_files)
            .chain(&self.deleted_files)
            .cloned()
            .collect();
        all.sort();
        all
    }
}

/// Utility for computing normalized content hashes and detecting changes.
pub struct SourceHasher;

impl SourceHasher {
    /// `true` for files hashed by structure rather than text.
    pub fn is_structured(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
    }

    /// Hashes `content` the way a file at `path` is hashed.
    pub fn hash_content(path: &Path, content: &[u8]) -> ContentHash {
        let Ok(text) = std::str::from_utf8(content) else {
            return ContentHash::from_bytes(content);
        };
        if Self::is_structured(path) {
            if let Ok(canonical) = canonical_form(text) {
                return ContentHash::from_text(&canonical);
            }
        }
        let squeezed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        ContentHash::from_text(&squeezed)
    }

    /// Reads and hashes a single file.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
        Ok(Self::hash_content(path, &content))
    }

    /// Compares current hashes against stored records.
    ///
    /// A stored value of `None` stands for a record that exists but could not
    /// be read; such files count as modified.
    pub fn detect_changes(
        current: &BTreeMap<PathBuf, ContentHash>,
        stored: &BTreeMap<PathBuf, Option<ContentHash>>,
    ) -> ChangeSet {
        let mut cs = ChangeSet::default();
        for (path, hash) in current {
            match stored.get(path) {
                Some(Some(recorded)) if recorded == hash => cs.unchanged_files.push(path.clone()),
                Some(_) => cs.modified_files.push(path.clone()),
                None => cs.new_files.push(path.clone()),
            }
        }
        cs.deleted_files = stored
            .keys()
            .filter(|p| !current.contains_key(*p))
            .cloned()
            .collect();
        cs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_ignored_for_scripts() {
        let a = SourceHasher::hash_content(Path::new("a.sh"), b"echo  one\n\n");
        let b = SourceHasher::hash_content(Path::new("a.sh"), b"echo one");
        assert_eq!(a, b);
        let c = SourceHasher::hash_content(Path::new("a.sh"), b"echo two");
        assert_ne!(a, c);
    }

    #[test]
    fn yaml_is_hashed_by_structure() {
        let a = SourceHasher::hash_content(Path::new("ci.yml"), b"a: [1, 2]  # c\n");
        let b = SourceHasher::hash_content(Path::new("ci.yml"), b"a:\n  - 1\n  - 2\n");
        assert_eq!(a, b);
        let c = SourceHasher::hash_content(Path::new("ci.yml"), b"a: [2, 1]\n");
        assert_ne!(a, c);
    }

    #[test]
    fn hash_file_nonexistent_errors() {
        assert!(SourceHasher::hash_file(Path::new("/nonexistent/file.sh")).is_err());
    }

    #[test]
    fn detect_changes_categorizes() {
        let h = |s: &str| ContentHash::from_text(s);
        let current: BTreeMap<_, _> = [
            (PathBuf::from("new.sh"), h("n")),
            (PathBuf::from("same.sh"), h("s")),
            (PathBuf::from("edited.sh"), h("e2")),
            (PathBuf::from("corrupt.sh"), h("c")),
        ]
        .into_iter()
        .collect();
        let stored: BTreeMap<_, _> = [
            (PathBuf::from("same.sh"), Some(h("s"))),
            (PathBuf::from("edited.sh"), Some(h("e1"))),
            (PathBuf::from("corrupt.sh"), None),
            (PathBuf::from("gone.sh"), Some(h("g"))),
        ]
        .into_iter()
        .collect();

        let cs = SourceHasher::detect_changes(&current, &stored);
        assert_eq!(cs.new_files, vec![PathBuf::from("new.sh")]);
        assert_eq!(
            cs.modified_files,
            vec![PathBuf::from("corrupt.sh"), PathBuf::from("edited.sh")]
        );
        assert_eq!(cs.deleted_files, vec![PathBuf::from("gone.sh")]);
        assert_eq!(cs.unchanged_files, vec![PathBuf::from("same.sh")]);
        assert_eq!(cs.changed().len(), 4);
        assert!(!cs.is_empty());
    }

    #[test]
    fn empty_change_set() {
        let cs = SourceHasher::detect_changes(&BTreeMap::new(), &BTreeMap::new());
        assert!(cs.is_empty());
    }
}
