//! Variable files and the ordered [`VariableSet`].
//!
//! Variable files use the `KEY=VALUE` / `export KEY=VALUE` line format.
//! Three layers feed a job's variables, highest precedence last: the global
//! file, the job's own file, and the variables written in the document.

use std::path::Path;

use tracing::warn;

use crate::error::ScriptError;

/// Global variable file name, looked up in the input root.
pub const GLOBAL_VARIABLES_FILE: &str = "global_variables.sh";

/// An ordered name to value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    entries: Vec<(String, String)>,
}

impl VariableSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if `key` is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no variables are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = VariableSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Returns `true` for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// File name of a job's variable file: the job name with every character
/// outside `[A-Za-z0-9_]` replaced by `_`, plus `_variables.sh`.
pub fn job_variable_file_name(job: &str) -> String {
    let normalized: String = job
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{normalized}_variables.sh")
}

/// Parses variable file content. `origin` is only used in messages.
///
/// Blank lines and `#` comments are skipped. Lines without `=` and keys that
/// are not identifiers are dropped with a warning. A value opened with a
/// quote that never closes is an error.
pub fn parse_variable_file(content: &str, origin: &Path) -> Result<VariableSet, ScriptError> {
    let mut set = VariableSet::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(file = %origin.display(), line = index + 1, "Ignoring line without '=' in variable file");
            continue;
        };
        let key = key.trim();
        if !is_identifier(key) {
            warn!(file = %origin.display(), key, "Dropping variable with invalid key");
            continue;
        }
        let value = unquote(value.trim()).map_err(|reason| ScriptError::MalformedVariableFile {
            path: origin.to_path_buf(),
            line: index + 1,
            reason,
        })?;
        set.insert(key, value);
    }
    Ok(set)
}

fn unquote(value: &str) -> Result<String, String> {
    let Some(quote) = value.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return Ok(value.to_string());
    };
    if value.len() >= 2 && value.ends_with(quote) {
        Ok(value[1..value.len() - 1].to_string())
    } else {
        Err(format!("unterminated {quote} quote"))
    }
}

/// Reads a variable file if it exists.
pub fn load_variable_file(path: &Path) -> Result<Option<VariableSet>, ScriptError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_variable_file(&content, path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(pairs: &[(&str, &str)]) -> VariableSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn parse_formats() {
        let content = r#"
# comment
export GREETING="hello world"
NAME='weave'
PLAIN=value=with=equals
  export   SPACED = padded
EMPTY=
"#;
        let vars = parse_variable_file(content, Path::new("vars.sh")).unwrap();
        assert_eq!(vars.get("GREETING"), Some("hello world"));
        assert_eq!(vars.get("NAME"), Some("weave"));
        assert_eq!(vars.get("PLAIN"), Some("value=with=equals"));
        assert_eq!(vars.get("SPACED"), Some("padded"));
        assert_eq!(vars.get("EMPTY"), Some(""));
        assert_eq!(vars.len(), 5);
    }

    #[test]
    fn invalid_keys_and_lines_are_dropped() {
        let content = "1BAD=x\nBAD-KEY=y\nset -e\nGOOD=z\n";
        let vars = parse_variable_file(content, Path::new("vars.sh")).unwrap();
        assert_eq!(vars, set(&[("GOOD", "z")]));
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = parse_variable_file("OK=1\nBROKEN=\"abc\n", Path::new("v.sh")).unwrap_err();
        match err {
            ScriptError::MalformedVariableFile { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn job_file_names_are_normalized() {
        assert_eq!(job_variable_file_name("build"), "build_variables.sh");
        assert_eq!(job_variable_file_name("deploy:prod-eu"), "deploy_prod_eu_variables.sh");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("_A1"));
        assert!(!is_identifier("1A"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("A-B"));
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_variable_file(&dir.path().join("none.sh")).unwrap().is_none());
        std::fs::write(dir.path().join("v.sh"), "A=1\n").unwrap();
        let vars = load_variable_file(&dir.path().join("v.sh")).unwrap().unwrap();
        assert_eq!(vars.get("A"), Some("1"));
    }
}
