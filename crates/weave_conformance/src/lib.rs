//! Conformance test helpers for the weave compiler.
//!
//! Provides [`ProjectFixture`], a throwaway project tree with a `src/` input
//! directory and an `out/` output directory, plus [`capture_logs`] for
//! asserting on the messages a run emits.

#![warn(missing_docs)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use weave_compile::{run_compile, CompileError, CompileSummary};
use weave_config::CompileOptions;

/// A temporary project with `src/` (inputs) and `out/` (outputs).
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Creates an empty project.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp project");
        std::fs::create_dir_all(dir.path().join("src")).expect("create src dir");
        Self { dir }
    }

    /// Creates a project whose `src/` holds `files` (relative path, content).
    pub fn with_inputs(files: &[(&str, &str)]) -> Self {
        let fixture = Self::new();
        for (rel, content) in files {
            fixture.write_input(rel, content);
        }
        fixture
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The input directory.
    pub fn input_dir(&self) -> PathBuf {
        self.root().join("src")
    }

    /// The output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Writes `content` to `rel` under the project root, creating parents.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Writes `content` to `rel` under `src/`.
    pub fn write_input(&self, rel: &str, content: &str) -> PathBuf {
        self.write(&format!("src/{rel}"), content)
    }

    /// Reads `rel` under `out/`.
    pub fn read_output(&self, rel: &str) -> String {
        std::fs::read_to_string(self.output_dir().join(rel))
            .unwrap_or_else(|e| panic!("read output {rel}: {e}"))
    }

    /// Compile options for `src/` into `out/` with two workers.
    pub fn options(&self) -> CompileOptions {
        let mut options = CompileOptions::new(self.input_dir(), self.output_dir());
        options.parallelism = 2;
        options
    }

    /// Compiles with [`Self::options`].
    pub fn try_compile(&self) -> Result<CompileSummary, CompileError> {
        run_compile(&self.options())
    }

    /// Compiles with [`Self::options`], panicking on failure.
    pub fn compile(&self) -> CompileSummary {
        self.try_compile()
            .unwrap_or_else(|e| panic!("compile failed: {e}"))
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a debug-level subscriber installed on the current thread
/// and returns its result along with everything it logged.
///
/// Only events emitted on the calling thread are captured.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().map(|b| b.clone()).unwrap_or_default();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}
