//! Line-based unified diffs for drift reports.

use std::time::Duration;

use similar::TextDiff;

const CONTEXT: usize = 3;

/// Past this, the diff settles for a valid but possibly longer edit script.
const DIFF_TIMEOUT: Duration = Duration::from_secs(2);

/// Renders a unified diff between `old` and `new`.
///
/// Returns an empty string when the texts have identical lines.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    TextDiff::configure()
        .timeout(DIFF_TIMEOUT)
        .diff_slices(a.as_slice(), b.as_slice())
        .unified_diff()
        .context_radius(CONTEXT)
        .header(old_label, new_label)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_texts_have_no_diff() {
        assert_eq!(unified_diff("a\nb\n", "a\nb\n", "x", "y"), "");
    }

    #[test]
    fn single_change() {
        let old = "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\n";
        let new = "one\ntwo\nthree\nfour\nFIVE\nsix\nseven\neight\n";
        let diff = unified_diff(old, new, "baseline", "current");
        assert_eq!(
            diff,
            "--- baseline\n+++ current\n@@ -2,7 +2,7 @@\n two\n three\n four\n-five\n+FIVE\n six\n seven\n eight\n"
        );
    }

    #[test]
    fn additions_and_removals() {
        let diff = unified_diff("a\nb\n", "a\nc\nd\n", "old", "new");
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+c\n"));
        assert!(diff.contains("+d\n"));
        assert!(diff.contains("@@ -1,2 +1,3 @@"));
    }

    #[test]
    fn distant_changes_make_separate_hunks() {
        let old: String = (0..20).map(|i| format!("l{i}\n")).collect();
        let new = old.replace("l1\n", "x1\n").replace("l18\n", "x18\n");
        let diff = unified_diff(&old, &new, "a", "b");
        assert_eq!(diff.matches("@@ -").count(), 2);
    }

    #[test]
    fn change_on_first_line() {
        let diff = unified_diff("x\n", "y\n", "a", "b");
        assert!(diff.contains("@@ -1 +1 @@\n-x\n+y\n"));
    }

    #[test]
    fn full_rewrite_of_a_large_file() {
        let old: String = (0..5_000).map(|i| format!("old {i}\n")).collect();
        let new: String = (0..5_000).map(|i| format!("new {i}\n")).collect();
        let diff = unified_diff(&old, &new, "a", "b");
        assert_eq!(diff.matches("@@ -").count(), 1);
        assert!(diff.contains("@@ -1,5000 +1,5000 @@\n"));
        assert_eq!(diff.lines().filter(|l| l.starts_with("-old ")).count(), 5_000);
        assert_eq!(diff.lines().filter(|l| l.starts_with("+new ")).count(), 5_000);
    }

    #[test]
    fn trailing_newline_alone_is_not_a_change() {
        assert_eq!(unified_diff("a\nb", "a\nb\n", "x", "y"), "");
    }

    #[test]
    fn empty_old_text() {
        let diff = unified_diff("", "a\n", "a", "b");
        assert!(diff.contains("@@ -0,0 +1 @@"));
        assert!(diff.contains("+a\n"));
    }
}
