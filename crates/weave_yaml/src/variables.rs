//! Reading and extending `variables:` mappings in place.

use serde_yaml::Value;
use weave_script::VariableSet;

use crate::layout::Section;
use crate::lines::{indent_of, is_blank, is_comment};
use crate::scalar::render_scalar;

/// What a `variables:` section defines.
#[derive(Debug, Clone, Default)]
pub struct VariablesView {
    /// Every key, including ones with structured values.
    pub keys: Vec<String>,
    /// Keys whose value is a scalar, rendered as strings.
    pub scalars: VariableSet,
}

impl VariablesView {
    /// `true` if the section defines `name` in any form.
    pub fn defines(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }

    /// `true` when every entry is a plain scalar.
    pub fn all_scalar(&self) -> bool {
        self.keys.len() == self.scalars.len()
    }
}

/// Reads a `variables:` section. Returns `None` if it is not a mapping.
pub fn read_variables(section: &Section) -> Option<VariablesView> {
    let mapping = match section.parse_value().ok()? {
        Value::Null => return Some(VariablesView::default()),
        Value::Mapping(m) => m,
        _ => return None,
    };
    let mut view = VariablesView::default();
    for (key, value) in mapping {
        let Some(key) = scalar_string(&key) else {
            continue;
        };
        if let Some(value) = scalar_string(&value) {
            view.scalars.insert(key.clone(), value);
        }
        view.keys.push(key);
    }
    Some(view)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Inserts `additions` at the top of `section`, ahead of its own entries.
///
/// Block mappings keep every existing line. Flow mappings and empty
/// sections are rewritten as block mappings.
pub fn add_variables(section: &mut Section, additions: &VariableSet) {
    if additions.is_empty() {
        return;
    }
    let block = section
        .inline_value()
        .map_or(true, |v| v.starts_with('&') && !v.contains(' '));
    let child_indent = section
        .body()
        .iter()
        .find(|l| !is_blank(l) && !is_comment(l))
        .map(|l| indent_of(l))
        .filter(|_| block)
        .unwrap_or(section.indent() + 2);
    let added = entry_lines(additions, child_indent);

    if block {
        let mut body = added;
        body.extend(section.body().iter().cloned());
        section.replace_body(body);
        return;
    }

    let mut body = added;
    if let Ok(Value::Mapping(existing)) = section.parse_value() {
        let pad = " ".repeat(child_indent);
        for (key, value) in existing {
            let single: serde_yaml::Mapping = std::iter::once((key, value)).collect();
            if let Ok(text) = serde_yaml::to_string(&single) {
                body.extend(text.lines().map(|l| format!("{pad}{l}")));
            }
        }
    }
    let key_line = section.key_prefix().to_string();
    section.replace_all(key_line, body);
}

/// Builds a fresh `variables:` section with its key at column `indent`.
pub fn new_variables_section(vars: &VariableSet, indent: usize) -> Section {
    Section::with_key(
        "variables",
        format!("{}variables:", " ".repeat(indent)),
        entry_lines(vars, indent + 2),
    )
}

fn entry_lines(vars: &VariableSet, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    vars.iter()
        .map(|(k, v)| format!("{pad}{}: {}", render_scalar(k), render_scalar(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{find_section, split_mapping};
    use pretty_assertions::assert_eq;

    fn section(text: &str) -> Section {
        let lines: Vec<String> = text.lines().map(String::from).collect();
        find_section(&split_mapping(&lines).unwrap(), "variables")
            .unwrap()
            .clone()
    }

    fn set(pairs: &[(&str, &str)]) -> VariableSet {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn reads_scalars_and_structured_keys() {
        let s = section("variables:\n  A: one\n  B: 2\n  C:\n    value: x\n    description: y\n");
        let view = read_variables(&s).unwrap();
        assert_eq!(view.keys, vec!["A", "B", "C"]);
        assert_eq!(view.scalars.get("B"), Some("2"));
        assert!(view.defines("C"));
        assert!(!view.all_scalar());
    }

    #[test]
    fn adds_ahead_of_existing_entries() {
        let mut s = section("variables:\n    # keep me\n    C: \"y\"\n");
        add_variables(&mut s, &set(&[("A", "g"), ("B", "j")]));
        assert_eq!(
            s.lines(),
            &["variables:", "    A: g", "    B: j", "    # keep me", "    C: \"y\""]
        );
    }

    #[test]
    fn flow_sections_are_rewritten() {
        let mut s = section("variables: {C: y}\n");
        add_variables(&mut s, &set(&[("A", "true")]));
        assert_eq!(s.lines(), &["variables:", "  A: 'true'", "  C: y"]);
    }

    #[test]
    fn new_section() {
        let s = new_variables_section(&set(&[("A", "a b"), ("B", "")]), 0);
        assert_eq!(s.lines(), &["variables:", "  A: a b", "  B: ''"]);
        let s = new_variables_section(&set(&[("A", "x")]), 2);
        assert_eq!(s.lines(), &["  variables:", "    A: x"]);
    }
}
