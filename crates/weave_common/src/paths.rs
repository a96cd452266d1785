//! Lexical path handling for the containment boundary.
//!
//! Containment is decided on normalized paths without touching the
//! filesystem, so a reference to a file that does not exist yet is still
//! classified correctly.

use std::path::{Component, Path, PathBuf};

/// Resolves `.` and `..` segments without consulting the filesystem.
///
/// Leading `..` segments of a relative path are kept, since they cannot be
/// resolved lexically. A `..` above the root of an absolute path is dropped.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Returns `true` if `path` stays inside `root` once both are normalized.
///
/// Relative paths are interpreted against `root`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    let root = normalize_lexically(root);
    if root == Path::new(".") && !path.is_absolute() {
        let full = normalize_lexically(path);
        return !matches!(full.components().next(), Some(Component::ParentDir));
    }
    let full = if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&root.join(path))
    };
    full.starts_with(&root)
}

/// Renders a path with forward slashes regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Returns the slash-separated path of `path` relative to `root`, or `None`
/// if it lies outside.
pub fn relative_slash(path: &Path, root: &Path) -> Option<String> {
    let root = normalize_lexically(root);
    let full = normalize_lexically(path);
    if root == Path::new(".") {
        return is_within(&full, &root).then(|| to_slash(&full));
    }
    full.strip_prefix(&root).ok().map(to_slash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(normalize_lexically(Path::new("./x.sh")), PathBuf::from("x.sh"));
    }

    #[test]
    fn normalize_keeps_leading_parent_segments() {
        assert_eq!(
            normalize_lexically(Path::new("../a/../../b")),
            PathBuf::from("../../b")
        );
    }

    #[test]
    fn normalize_empty_is_current_dir() {
        assert_eq!(normalize_lexically(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn parent_above_root_is_dropped() {
        assert_eq!(normalize_lexically(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn containment() {
        let root = Path::new("/project/scripts");
        assert!(is_within(Path::new("build.sh"), root));
        assert!(is_within(Path::new("nested/../build.sh"), root));
        assert!(is_within(Path::new("/project/scripts/a/b.sh"), root));
        assert!(!is_within(Path::new("../secret.sh"), root));
        assert!(!is_within(Path::new("/etc/passwd"), root));
        assert!(!is_within(Path::new("/project/scripts-other/x.sh"), root));
    }

    #[test]
    fn containment_under_current_dir() {
        let root = Path::new(".");
        assert!(is_within(Path::new("./a/b.sh"), root));
        assert!(!is_within(Path::new("a/../../b.sh"), root));
    }

    #[test]
    fn relative_slash_inside_and_outside() {
        let root = Path::new("/p");
        assert_eq!(
            relative_slash(Path::new("/p/a/./b.sh"), root).as_deref(),
            Some("a/b.sh")
        );
        assert_eq!(relative_slash(Path::new("/q/b.sh"), root), None);
    }

    #[test]
    fn to_slash_converts_backslashes() {
        assert_eq!(to_slash(Path::new("a\\b\\c.sh")), "a/b/c.sh");
    }
}
