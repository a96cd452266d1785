//! Change detection and drift tracking for weave.
//!
//! Two stores live under the reserved `.weave/` directory: input-side
//! records that decide whether a source tree needs recompiling, and
//! output-side baselines holding exactly what the compiler last wrote, so
//! hand edits to generated files can be detected and shown as a diff.

#![warn(missing_docs)]

pub mod clean;
pub mod diff;
pub mod drift;
pub mod error;
pub mod hasher;
pub mod input;
pub mod store;

pub use clean::{clean_outputs, CleanReport};
pub use diff::unified_diff;
pub use drift::{check_output, detect_drift, DriftProblem, DriftReport, DriftStatus, DriftedFile};
pub use error::CacheError;
pub use hasher::{ChangeSet, SourceHasher};
pub use input::{InputChangeDetector, INPUT_HASH_SUBDIR};
pub use store::{Baseline, FsHashStore, HashStore, MemoryHashStore, OUTPUT_HASH_SUBDIR};
