//! Structural checks and canonical forms for YAML text.

use serde::Deserialize;

use crate::error::YamlError;

/// Parses every document in `text`, failing on the first malformed one.
pub fn validate_structure(text: &str) -> Result<(), YamlError> {
    parse_all(text).map(|_| ())
}

fn parse_all(text: &str) -> Result<Vec<serde_yaml::Value>, YamlError> {
    serde_yaml::Deserializer::from_str(text)
        .map(|doc| serde_yaml::Value::deserialize(doc).map_err(YamlError::from))
        .collect()
}

/// Re-serializes `text` so that formatting-only differences disappear.
///
/// Comments, quoting style and indentation do not survive; mapping order
/// does.
pub fn canonical_form(text: &str) -> Result<String, YamlError> {
    let docs = parse_all(text)?;
    let mut out = String::new();
    for doc in docs {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&doc)?);
    }
    Ok(out)
}

/// `true` if both texts parse to the same YAML data.
pub fn structurally_equal(a: &str, b: &str) -> bool {
    match (parse_all(a), parse_all(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_differences_are_equal() {
        let a = "a: 1\nb:\n  - x   # comment\n";
        let b = "a: 1\nb: [x]\n";
        assert!(structurally_equal(a, b));
        assert_eq!(canonical_form(a).unwrap(), canonical_form(b).unwrap());
    }

    #[test]
    fn content_differences_are_not() {
        assert!(!structurally_equal("a: 1\n", "a: 2\n"));
        assert!(!structurally_equal("a: [1\n", "a: [1\n"));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(validate_structure("a: 1\n---\nb: [\n").is_err());
        assert!(validate_structure("").is_ok());
    }
}
