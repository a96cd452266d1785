//! Output-side baseline storage.
//!
//! A baseline is the base64 of exactly what the compiler last wrote to an
//! output file. Baselines live in `<base>/.weave/output_hashes/<rel>.hash`;
//! older trees kept them next to the output as `<output>.hash`. The
//! centralized record always wins, and legacy records are moved over the
//! first time an output is written again.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use weave_common::{ContentHash, RESERVED_DIR};

use crate::error::CacheError;

/// Subdirectory of `.weave/` holding output baselines.
pub const OUTPUT_HASH_SUBDIR: &str = "output_hashes";

const HASH_EXT: &str = "hash";

/// What is known about an output's last compiled content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// No record exists.
    Missing,
    /// A record exists but does not decode.
    Corrupt {
        /// Decoder message.
        reason: String,
    },
    /// The decoded text of the last write.
    Present(String),
}

/// Persistence for output baselines, keyed by output path.
///
/// Implementations must be usable from several compile workers at once;
/// each worker only ever touches its own key.
pub trait HashStore: Send + Sync {
    /// Reads the stored hash for `tracked`, if any. Never mutates the store.
    fn load(&self, tracked: &Path) -> Result<Option<ContentHash>, CacheError>;

    /// Records `hash` as the baseline for `tracked`.
    fn save(&self, tracked: &Path, hash: &ContentHash) -> Result<(), CacheError>;

    /// Deletes the baseline for `tracked`. Returns `true` if one existed.
    fn remove(&self, tracked: &Path) -> Result<bool, CacheError>;

    /// Every output path with a baseline, sorted.
    fn tracked(&self) -> Result<Vec<PathBuf>, CacheError>;

    /// Moves a legacy record into the current layout. Returns `true` if
    /// anything moved.
    fn migrate(&self, _tracked: &Path) -> Result<bool, CacheError> {
        Ok(false)
    }

    /// Loads and decodes the baseline for `tracked`.
    fn baseline(&self, tracked: &Path) -> Result<Baseline, CacheError> {
        Ok(match self.load(tracked)? {
            None => Baseline::Missing,
            Some(hash) => match hash.decode() {
                Ok(text) => Baseline::Present(text),
                Err(e) => Baseline::Corrupt { reason: e.reason },
            },
        })
    }
}

/// Maps a tracked file to its record under `<base>/.weave/<subdir>/`.
pub(crate) fn record_path(base: &Path, subdir: &str, tracked: &Path, ext: &str) -> PathBuf {
    let rel = match tracked.strip_prefix(base) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            warn!(
                path = %tracked.display(),
                base = %base.display(),
                "tracked file is not under the base directory, using its absolute path"
            );
            let flat = tracked.to_string_lossy();
            PathBuf::from(flat.trim_start_matches(&['/', '\\'][..]).replace(':', "_"))
        }
    };
    base.join(RESERVED_DIR).join(subdir).join(with_ext(&rel, ext))
}

fn with_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn strip_ext(path: &Path, ext: &str) -> Option<PathBuf> {
    let s = path.to_str()?;
    s.strip_suffix(&format!(".{ext}")).map(PathBuf::from)
}

/// Recursively lists regular files under `dir`, optionally skipping the
/// reserved directory and `.git`.
pub(crate) fn walk_files(dir: &Path, skip_reserved: bool, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if path.is_dir() {
            if skip_reserved && (name == RESERVED_DIR || name == ".git") {
                continue;
            }
            walk_files(&path, skip_reserved, out);
        } else if path.is_file() {
            out.push(path);
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, CacheError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

fn remove_optional(path: &Path) -> Result<bool, CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Filesystem-backed baseline store rooted at an output directory.
#[derive(Debug, Clone)]
pub struct FsHashStore {
    base: PathBuf,
    subdir: String,
}

impl FsHashStore {
    /// Store for outputs under `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            subdir: OUTPUT_HASH_SUBDIR.to_string(),
        }
    }

    /// The output directory this store tracks.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Location of the centralized record for `tracked`.
    pub fn record_path(&self, tracked: &Path) -> PathBuf {
        record_path(&self.base, &self.subdir, tracked, HASH_EXT)
    }

    /// Location of the legacy sibling record for `tracked`.
    pub fn legacy_path(tracked: &Path) -> PathBuf {
        with_ext(tracked, HASH_EXT)
    }

    fn records_dir(&self) -> PathBuf {
        self.base.join(RESERVED_DIR).join(&self.subdir)
    }
}

impl HashStore for FsHashStore {
    fn load(&self, tracked: &Path) -> Result<Option<ContentHash>, CacheError> {
        let text = match read_optional(&self.record_path(tracked))? {
            Some(text) => Some(text),
            None => read_optional(&Self::legacy_path(tracked))?,
        };
        Ok(text.map(ContentHash::from_encoded))
    }

    fn save(&self, tracked: &Path, hash: &ContentHash) -> Result<(), CacheError> {
        let record = self.record_path(tracked);
        if let Some(parent) = record.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        std::fs::write(&record, hash.encoded()).map_err(|e| CacheError::io(&record, e))?;
        let legacy = Self::legacy_path(tracked);
        if remove_optional(&legacy)? {
            debug!(path = %legacy.display(), "removed legacy hash file superseded by centralized record");
        }
        Ok(())
    }

    fn remove(&self, tracked: &Path) -> Result<bool, CacheError> {
        let centralized = remove_optional(&self.record_path(tracked))?;
        let legacy = remove_optional(&Self::legacy_path(tracked))?;
        Ok(centralized || legacy)
    }

    fn tracked(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut tracked = BTreeSet::new();

        let records_dir = self.records_dir();
        let mut records = Vec::new();
        walk_files(&records_dir, false, &mut records);
        for record in records {
            let Ok(rel) = record.strip_prefix(&records_dir) else {
                continue;
            };
            if let Some(rel) = strip_ext(rel, HASH_EXT) {
                tracked.insert(self.base.join(rel));
            }
        }

        let mut files = Vec::new();
        walk_files(&self.base, true, &mut files);
        for file in files {
            if let Some(output) = strip_ext(&file, HASH_EXT) {
                tracked.insert(output);
            }
        }
        Ok(tracked.into_iter().collect())
    }

    fn migrate(&self, tracked: &Path) -> Result<bool, CacheError> {
        let legacy = Self::legacy_path(tracked);
        if !legacy.is_file() {
            return Ok(false);
        }
        let record = self.record_path(tracked);
        if record.exists() {
            debug!(path = %legacy.display(), "centralized hash file exists, removing legacy one");
            remove_optional(&legacy)?;
            return Ok(false);
        }
        if let Some(parent) = record.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        std::fs::rename(&legacy, &record).map_err(|e| CacheError::io(&legacy, e))?;
        info!(from = %legacy.display(), to = %record.display(), "migrated hash file");
        Ok(true)
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    records: Mutex<BTreeMap<PathBuf, ContentHash>>,
}

impl MemoryHashStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, ContentHash>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, tracked: &Path) -> Result<Option<ContentHash>, CacheError> {
        Ok(self.records().get(tracked).cloned())
    }

    fn save(&self, tracked: &Path, hash: &ContentHash) -> Result<(), CacheError> {
        self.records().insert(tracked.to_path_buf(), hash.clone());
        Ok(())
    }

    fn remove(&self, tracked: &Path) -> Result<bool, CacheError> {
        Ok(self.records().remove(tracked).is_some())
    }

    fn tracked(&self) -> Result<Vec<PathBuf>, CacheError> {
        Ok(self.records().keys().cloned().collect())
    }
}
