//! Input-side change detection.
//!
//! Each tracked source file gets a JSON record under
//! `<input>/.weave/input_hashes/<rel>.json` holding its normalized hash and
//! when it was last checked. A tree needs compiling when any file is new,
//! changed, deleted, or has an unreadable record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use weave_common::{ContentHash, RESERVED_DIR};

use crate::error::CacheError;
use crate::hasher::{ChangeSet, SourceHasher};
use crate::store::{record_path, walk_files};

/// Subdirectory of `.weave/` holding input records.
pub const INPUT_HASH_SUBDIR: &str = "input_hashes";

const RECORD_EXT: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct InputRecord {
    hash: ContentHash,
    checked_at: DateTime<Utc>,
}

/// Tracks whether a source tree changed since it was last compiled.
#[derive(Debug, Clone)]
pub struct InputChangeDetector {
    base: PathBuf,
    /// Subtrees of `base` (relative to it) that are not sources.
    excluded: Vec<PathBuf>,
}

impl InputChangeDetector {
    /// Detector for the tree rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            excluded: Vec::new(),
        }
    }

    /// Leaves the subtree at `rel` (relative to the base) out of the
    /// tracked files, e.g. an output directory nested in the input.
    pub fn excluding(mut self, rel: impl Into<PathBuf>) -> Self {
        self.excluded.push(rel.into());
        self
    }

    fn is_excluded(&self, file: &Path) -> bool {
        file.strip_prefix(&self.base)
            .is_ok_and(|rel| self.excluded.iter().any(|ex| rel.starts_with(ex)))
    }

    fn records_dir(&self) -> PathBuf {
        self.base.join(RESERVED_DIR).join(INPUT_HASH_SUBDIR)
    }

    fn record_for(&self, file: &Path) -> PathBuf {
        record_path(&self.base, INPUT_HASH_SUBDIR, file, RECORD_EXT)
    }

    /// Every source file in the tree, sorted.
    fn source_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        walk_files(&self.base, true, &mut files);
        files.retain(|f| !self.is_excluded(f));
        files.sort();
        files
    }

    fn current_hashes(&self) -> BTreeMap<PathBuf, ContentHash> {
        let mut hashes = BTreeMap::new();
        for file in self.source_files() {
            match SourceHasher::hash_file(&file) {
                Ok(hash) => {
                    hashes.insert(file, hash);
                }
                Err(e) => warn!(error = %e, "could not hash source file"),
            }
        }
        hashes
    }

    /// Reads a record; `Some(None)` means the record exists but is unreadable.
    fn read_record(&self, file: &Path) -> Option<Option<InputRecord>> {
        let record = self.record_for(file);
        let text = std::fs::read_to_string(&record).ok()?;
        match serde_json::from_str(&text) {
            Ok(parsed) => Some(Some(parsed)),
            Err(e) => {
                warn!(path = %record.display(), error = %e, "could not decode input hash record");
                Some(None)
            }
        }
    }

    fn stored_hashes(&self) -> BTreeMap<PathBuf, Option<ContentHash>> {
        let records_dir = self.records_dir();
        let mut records = Vec::new();
        walk_files(&records_dir, false, &mut records);

        let mut stored = BTreeMap::new();
        for record in records {
            let Some(file) = record
                .strip_prefix(&records_dir)
                .ok()
                .and_then(|rel| rel.to_str())
                .and_then(|rel| rel.strip_suffix(".json"))
                .map(|rel| self.base.join(rel))
            else {
                continue;
            };
            if self.is_excluded(&file) {
                continue;
            }
            let hash = self
                .read_record(&file)
                .and_then(|parsed| parsed.map(|r| r.hash));
            stored.insert(file, hash);
        }
        stored
    }

    /// Compares the tree against its records.
    pub fn detect_changes(&self) -> ChangeSet {
        SourceHasher::detect_changes(&self.current_hashes(), &self.stored_hashes())
    }

    /// `true` if `file` differs from its record or has no usable record.
    pub fn has_file_changed(&self, file: &Path) -> bool {
        let Ok(current) = SourceHasher::hash_file(file) else {
            return true;
        };
        match self.read_record(file) {
            Some(Some(record)) => record.hash != current,
            _ => true,
        }
    }

    /// `true` if anything in the tree is new, changed or deleted.
    pub fn needs_compilation(&self) -> bool {
        let changes = self.detect_changes();
        if !changes.is_empty() {
            debug!(
                new = changes.new_files.len(),
                modified = changes.modified_files.len(),
                deleted = changes.deleted_files.len(),
                "input tree changed"
            );
        }
        !changes.is_empty()
    }

    /// Paths that are new, changed or deleted.
    pub fn get_changed_files(&self) -> Vec<PathBuf> {
        self.detect_changes().changed()
    }

    /// Records the current state of the tree as the new baseline and drops
    /// records for files that no longer exist.
    pub fn mark_compiled(&self) -> Result<(), CacheError> {
        let now = Utc::now();
        let current = self.current_hashes();
        for (file, hash) in &current {
            let record = self.record_for(file);
            if let Some(parent) = record.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
            }
            let body = serde_json::to_string_pretty(&InputRecord {
                hash: hash.clone(),
                checked_at: now,
            })
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
            std::fs::write(&record, body).map_err(|e| CacheError::io(&record, e))?;
        }
        for stale in self.stored_hashes().keys().filter(|f| !current.contains_key(*f)) {
            let record = self.record_for(stale);
            if let Err(e) = std::fs::remove_file(&record) {
                warn!(path = %record.display(), error = %e, "could not remove stale input record");
            }
        }
        debug!(files = current.len(), "marked input tree as compiled");
        Ok(())
    }
}
