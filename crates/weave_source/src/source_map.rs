//! The Script Source Map: every script under the scripts root, loaded once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use weave_common::relative_slash;

use crate::discover::{discover_files, is_script_file};
use crate::error::SourceError;
use crate::source_file::SourceFile;

/// Mapping from slash-separated relative path to trimmed script content.
///
/// Built serially before any compile worker starts and shared read-only
/// afterwards. Empty scripts are excluded (and logged), so a lookup that
/// misses means "absent or empty" to the inlining engine.
#[derive(Debug, Default)]
pub struct ScriptSourceMap {
    root: PathBuf,
    files: BTreeMap<String, SourceFile>,
}

impl ScriptSourceMap {
    /// Creates an empty source map for the given scripts root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
        }
    }

    /// Scans `root` recursively and loads every script file.
    ///
    /// Fails only if the root itself is missing or unreadable. Files that are
    /// not valid UTF-8 or are empty after trimming are skipped with a warning.
    pub fn collect(root: &Path) -> Result<Self, SourceError> {
        let mut map = Self::new(root);
        for path in discover_files(root, is_script_file)? {
            let bytes = std::fs::read(&path).map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
            let Ok(text) = String::from_utf8(bytes) else {
                warn!(path = %path.display(), "Skipping script that is not valid UTF-8");
                continue;
            };
            let Some(rel) = relative_slash(&path, root) else {
                continue;
            };
            map.insert_file(SourceFile::new(rel, path, &text));
        }
        debug!(root = %root.display(), scripts = map.len(), "Collected script sources");
        Ok(map)
    }

    /// Adds a script from an in-memory string (useful for tests).
    ///
    /// Returns `false` if the content was empty and therefore excluded.
    pub fn add_source(&mut self, rel_path: &str, content: &str) -> bool {
        let path = self.root.join(rel_path);
        self.insert_file(SourceFile::new(rel_path, path, content))
    }

    fn insert_file(&mut self, file: SourceFile) -> bool {
        if file.is_empty() {
            warn!(path = %file.path.display(), "Excluding empty script from the source map");
            return false;
        }
        self.files.insert(file.rel_path.clone(), file);
        true
    }

    /// Looks up a script by its normalized relative path.
    pub fn get(&self, rel_path: &str) -> Option<&SourceFile> {
        self.files.get(rel_path)
    }

    /// The scripts root this map was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of loaded scripts.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no scripts were loaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates over loaded scripts in path order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }
}
