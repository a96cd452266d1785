//! The compile run over a whole input tree.
//!
//! 1. Check the input directory and decide whether anything changed
//! 2. Build the Script Source Map and load global variables (serially)
//! 3. Compile every document on a bounded worker pool
//! 4. Write outputs with baselines, then mark the input tree compiled

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, error, info};
use weave_cache::{FsHashStore, HashStore, InputChangeDetector};
use weave_common::{normalize_lexically, relative_slash};
use weave_config::CompileOptions;
use weave_script::{load_variable_file, VariableSet, GLOBAL_VARIABLES_FILE};
use weave_source::{discover_documents, ScriptSourceMap};

use crate::artifact::ArtifactPackager;
use crate::banner::banner_lines;
use crate::engine::Inliner;
use crate::error::CompileError;
use crate::interpreter::InterpreterPackager;
use crate::writer::{write_compiled_file, WriteOutcome};

/// Totals for one compile run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileSummary {
    /// Documents compiled.
    pub documents: usize,
    /// Outputs created or replaced.
    pub written: usize,
    /// Outputs already up to date.
    pub unchanged: usize,
    /// Outputs a dry run would have written.
    pub would_write: usize,
    /// Substitutions across all documents.
    pub inlined: usize,
    /// References refused for leaving the scripts root.
    pub refused: Vec<String>,
    /// The run was skipped because no input changed.
    pub skipped: bool,
}

struct DocumentResult {
    outcome: WriteOutcome,
    inlined: usize,
    refused: Vec<String>,
}

/// Compiles `options.input_dir` into `options.output_dir`, keeping
/// baselines under the output directory.
pub fn run_compile(options: &CompileOptions) -> Result<CompileSummary, CompileError> {
    let store = FsHashStore::new(&options.output_dir);
    run_compile_with_store(options, &store)
}

/// Like [`run_compile`] with an explicit baseline store.
pub fn run_compile_with_store(
    options: &CompileOptions,
    store: &dyn HashStore,
) -> Result<CompileSummary, CompileError> {
    let input = &options.input_dir;
    if !input.is_dir() {
        return Err(CompileError::InputNotFound {
            path: input.clone(),
        });
    }

    let nested_output = nested_dir(input, &options.output_dir);
    let mut documents = discover_documents(input)?;
    if let Some(ref rel) = nested_output {
        debug!(output = %rel.display(), "output directory is inside the input; excluding it");
        documents.retain(|path| !path.strip_prefix(input).is_ok_and(|r| r.starts_with(rel)));
    }
    if documents.is_empty() {
        return Err(CompileError::NoDocuments {
            path: input.clone(),
        });
    }
    let targets: Vec<(PathBuf, String, PathBuf)> = documents
        .into_iter()
        .filter_map(|path| {
            let rel = relative_slash(&path, input)?;
            let output = options.output_dir.join(&rel);
            Some((path, rel, output))
        })
        .collect();

    let detector = match nested_output {
        Some(rel) => InputChangeDetector::new(input).excluding(rel),
        None => InputChangeDetector::new(input),
    };
    if !options.force {
        let outputs_present = targets.iter().all(|(_, _, out)| out.is_file());
        if outputs_present && !detector.needs_compilation() {
            info!(input = %input.display(), "no input changes since the last compile; nothing to do");
            return Ok(CompileSummary {
                skipped: true,
                ..CompileSummary::default()
            });
        }
    }

    let sources = ScriptSourceMap::collect(input)?;
    let globals = load_globals(input)?;
    let inliner = Inliner::new(
        input,
        &sources,
        &globals,
        ArtifactPackager::new(input, options.max_artifact_bytes, options.warn_artifact_bytes),
        InterpreterPackager::new(input, options.max_inline_len),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.parallelism)
        .build()
        .map_err(|e| CompileError::WorkerPool {
            reason: e.to_string(),
        })?;
    debug!(documents = targets.len(), workers = options.parallelism, "compiling");

    let results: Vec<(String, Result<DocumentResult, CompileError>)> = pool.install(|| {
        targets
            .par_iter()
            .map(|(path, rel, output)| {
                let result = compile_one(&inliner, options, store, path, rel, output);
                (rel.clone(), result)
            })
            .collect()
    });

    let total = results.len();
    let mut summary = CompileSummary {
        documents: total,
        ..CompileSummary::default()
    };
    let mut failures = Vec::new();
    for (rel, result) in results {
        match result {
            Ok(doc) => {
                summary.inlined += doc.inlined;
                summary.refused.extend(doc.refused);
                match doc.outcome {
                    WriteOutcome::Written => summary.written += 1,
                    WriteOutcome::Unchanged => summary.unchanged += 1,
                    WriteOutcome::DryRun => summary.would_write += 1,
                }
            }
            Err(e) => {
                error!(document = %rel, error = %e, "compilation failed");
                failures.push((rel, e));
            }
        }
    }
    if !failures.is_empty() {
        return Err(CompileError::DocumentsFailed { failures, total });
    }

    if !options.dry_run {
        detector.mark_compiled()?;
    }
    info!(
        documents = summary.documents,
        written = summary.written,
        unchanged = summary.unchanged,
        inlined = summary.inlined,
        refused = summary.refused.len(),
        "compile finished"
    );
    Ok(summary)
}

/// `dir` relative to `parent` when it is a proper subdirectory of it.
fn nested_dir(parent: &Path, dir: &Path) -> Option<PathBuf> {
    let parent = normalize_lexically(&std::path::absolute(parent).ok()?);
    let dir = normalize_lexically(&std::path::absolute(dir).ok()?);
    let rel = dir.strip_prefix(&parent).ok()?;
    (!rel.as_os_str().is_empty()).then(|| rel.to_path_buf())
}

fn load_globals(input: &Path) -> Result<VariableSet, CompileError> {
    let path = input.join(GLOBAL_VARIABLES_FILE);
    match load_variable_file(&path) {
        Ok(vars) => Ok(vars.unwrap_or_default()),
        Err(source) => Err(CompileError::Script {
            document: GLOBAL_VARIABLES_FILE.to_string(),
            source,
        }),
    }
}

fn compile_one(
    inliner: &Inliner<'_>,
    options: &CompileOptions,
    store: &dyn HashStore,
    path: &Path,
    rel: &str,
    output: &Path,
) -> Result<DocumentResult, CompileError> {
    let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    let compiled = inliner.compile(rel, &text)?;

    let content = if compiled.inlined > 0 {
        let mut content = banner_lines(
            &options.input_dir,
            &options.output_dir,
            options.dry_run,
            options.custom_header.as_deref(),
        )
        .join("\n");
        content.push('\n');
        content.push_str(&compiled.text);
        content
    } else {
        compiled.text
    };

    let outcome = write_compiled_file(output, &content, store, options.dry_run, options.force)?;
    Ok(DocumentResult {
        outcome,
        inlined: compiled.inlined,
        refused: compiled.refused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weave_cache::MemoryHashStore;

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, CompileOptions) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join("src").join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let mut options = CompileOptions::new(dir.path().join("src"), dir.path().join("out"));
        options.parallelism = 2;
        (dir, options)
    }

    #[test]
    fn compiles_tree_with_banner() {
        let (dir, options) = project(&[
            ("ci.yml", "build:\n  script:\n    - ./build.sh\n"),
            ("nested/plain.yml", "lint:\n  script: make lint\n"),
            ("build.sh", "make all"),
        ]);
        let summary = run_compile(&options).unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.written, 2);
        assert_eq!(summary.inlined, 1);

        let out = std::fs::read_to_string(dir.path().join("out/ci.yml")).unwrap();
        assert!(out.starts_with("# DO NOT EDIT\n"));
        assert!(out.contains("make all"));
        let plain = std::fs::read_to_string(dir.path().join("out/nested/plain.yml")).unwrap();
        assert_eq!(plain, "lint:\n  script: make lint\n");
        assert!(dir.path().join("out/.weave/output_hashes/ci.yml.hash").is_file());
    }

    #[test]
    fn unchanged_input_is_skipped_until_an_output_vanishes() {
        let (dir, options) = project(&[("ci.yml", "a:\n  script: echo\n")]);
        assert!(!run_compile(&options).unwrap().skipped);
        assert!(run_compile(&options).unwrap().skipped);

        std::fs::remove_file(dir.path().join("out/ci.yml")).unwrap();
        let summary = run_compile(&options).unwrap();
        assert!(!summary.skipped);
        assert_eq!(summary.written, 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (dir, mut options) = project(&[("ci.yml", "a:\n  script: echo\n")]);
        options.dry_run = true;
        let store = MemoryHashStore::new();
        let summary = run_compile_with_store(&options, &store).unwrap();
        assert_eq!(summary.would_write, 1);
        assert!(!dir.path().join("out").exists());
        assert!(!dir.path().join("src/.weave").exists());
        assert!(store.tracked().unwrap().is_empty());
    }

    #[test]
    fn one_failure_fails_the_run() {
        let (dir, options) = project(&[
            ("good.yml", "a:\n  script: echo\n"),
            ("bad.yml", "b:\n  script: ./missing.sh\n"),
        ]);
        let err = run_compile(&options).unwrap_err();
        match err {
            CompileError::DocumentsFailed { failures, total } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "bad.yml");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("src/.weave").exists());
    }

    #[test]
    fn missing_input_and_empty_input() {
        let (dir, options) = project(&[]);
        assert!(matches!(
            run_compile(&options).unwrap_err(),
            CompileError::InputNotFound { .. }
        ));
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        assert!(matches!(
            run_compile(&options).unwrap_err(),
            CompileError::NoDocuments { .. }
        ));
    }

    #[test]
    fn output_nested_in_input_is_not_recompiled() {
        let (dir, mut options) = project(&[
            ("ci.yml", "build:\n  script:\n    - ./build.sh\n"),
            ("build.sh", "make all"),
        ]);
        options.output_dir = dir.path().join("src/public");

        let first = run_compile(&options).unwrap();
        assert_eq!(first.documents, 1);
        assert_eq!(first.written, 1);
        assert!(dir.path().join("src/public/ci.yml").is_file());

        assert!(run_compile(&options).unwrap().skipped);
        options.force = true;
        let forced = run_compile(&options).unwrap();
        assert_eq!(forced.documents, 1);
        assert!(!dir.path().join("src/public/public").exists());
    }

    #[test]
    fn nested_dir_is_relative_to_parent() {
        assert_eq!(
            nested_dir(Path::new("ci"), Path::new("ci/./public")),
            Some(PathBuf::from("public"))
        );
        assert_eq!(nested_dir(Path::new("ci"), Path::new("out")), None);
        assert_eq!(nested_dir(Path::new("ci"), Path::new("ci")), None);
    }

    #[test]
    fn refusals_are_reported_but_do_not_fail() {
        let (_dir, options) = project(&[("ci.yml", "a:\n  script:\n    - ../../etc/evil.sh\n")]);
        let summary = run_compile(&options).unwrap();
        assert_eq!(summary.refused, vec!["../../etc/evil.sh".to_string()]);
        assert_eq!(summary.inlined, 0);
    }
}
