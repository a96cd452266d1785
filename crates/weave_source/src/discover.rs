//! Recursive discovery of documents and scripts under a directory.

use std::path::{Path, PathBuf};

use weave_common::RESERVED_DIR;

use crate::error::SourceError;

/// Script extensions recognized when scanning the scripts root.
const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "ps1"];

/// Document extensions recognized when scanning the input tree.
const DOCUMENT_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[RESERVED_DIR, ".git"];

/// Returns `true` if the file extension marks a shell script.
pub fn is_script_file(path: &Path) -> bool {
    has_extension(path, SCRIPT_EXTENSIONS)
}

/// Returns `true` if the file extension marks a pipeline document.
pub fn is_document_file(path: &Path) -> bool {
    has_extension(path, DOCUMENT_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
}

/// Discovers pipeline documents under `dir` (recursive), sorted by path.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    discover_files(dir, is_document_file)
}

/// Discovers every file under `dir` accepted by `filter`, sorted by path.
///
/// The reserved state directory and `.git` are skipped.
pub fn discover_files(
    dir: &Path,
    filter: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut files = Vec::new();
    walk_dir(dir, &filter, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(
    dir: &Path,
    filter: &impl Fn(&Path) -> bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), SourceError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            let skipped = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| SKIPPED_DIRS.contains(&n));
            if !skipped {
                walk_dir(&path, filter, files)?;
            }
        } else if filter(&path) {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extension_checks_ignore_case() {
        assert!(is_script_file(Path::new("a/B.SH")));
        assert!(is_script_file(Path::new("deploy.ps1")));
        assert!(is_script_file(Path::new("x.bash")));
        assert!(!is_script_file(Path::new("x.py")));
        assert!(is_document_file(Path::new(".gitlab-ci.yml")));
        assert!(is_document_file(Path::new("a.YAML")));
        assert!(!is_document_file(Path::new("a.json")));
    }

    #[test]
    fn discovers_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("b.yml"), "").unwrap();
        fs::write(dir.path().join("a.yaml"), "").unwrap();
        fs::write(dir.path().join("nested/deeper/c.yml"), "").unwrap();
        fs::write(dir.path().join("nested/readme.md"), "").unwrap();

        let docs = discover_documents(dir.path()).unwrap();
        let names: Vec<_> = docs
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.yaml"),
                PathBuf::from("b.yml"),
                PathBuf::from("nested/deeper/c.yml"),
            ]
        );
    }

    #[test]
    fn reserved_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".weave/input_hashes")).unwrap();
        fs::write(dir.path().join(".weave/input_hashes/x.yml"), "").unwrap();
        fs::write(dir.path().join("real.yml"), "").unwrap();

        let docs = discover_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].ends_with("real.yml"));
    }

    #[test]
    fn missing_directory_errors() {
        let err = discover_documents(Path::new("/nonexistent/weave/dir")).unwrap_err();
        assert!(matches!(err, SourceError::DirectoryNotFound { .. }));
    }
}
