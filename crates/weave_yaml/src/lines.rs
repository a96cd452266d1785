//! Line-level predicates shared by the layout scanner and field parsers.

use std::sync::OnceLock;

use regex::Regex;

pub(crate) fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

pub(crate) fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

pub(crate) fn is_sequence_item(line: &str) -> bool {
    let t = line.trim_start();
    t == "-" || t.starts_with("- ")
}

/// `---` or `...` at column zero.
pub(crate) fn is_document_marker(line: &str) -> bool {
    ["---", "..."].iter().any(|m| {
        line.strip_prefix(m)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
    })
}

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^ *(?:"((?:[^"\\]|\\.)*)"|'((?:[^']|'')*)'|([^\s#'"\[\]{},&*!|>%@`?:-][^#]*?|-[^\s#][^#]*?))\s*:(?:\s|$)"#,
        )
        .expect("mapping key regex is valid")
    })
}

/// Returns the key if `line` starts a block mapping entry.
pub(crate) fn mapping_key(line: &str) -> Option<String> {
    if is_document_marker(line) {
        return None;
    }
    let caps = key_regex().captures(line)?;
    if let Some(k) = caps.get(1) {
        return Some(k.as_str().replace("\\\"", "\""));
    }
    if let Some(k) = caps.get(2) {
        return Some(k.as_str().replace("''", "'"));
    }
    caps.get(3).map(|k| k.as_str().trim_end().to_string())
}

/// Byte offset just past the key's colon.
pub(crate) fn key_end(line: &str) -> Option<usize> {
    let caps = key_regex().captures(line)?;
    let whole = caps.get(0)?;
    let text = whole.as_str();
    // The match may include one trailing whitespace char after the colon.
    let colon = text.rfind(':')?;
    Some(whole.start() + colon + 1)
}

fn block_scalar_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^\s*-\s*|:\s+)(?:[&!]\S*\s+)*[|>][0-9+\-]*\s*(?:#.*)?$")
            .expect("block scalar regex is valid")
    })
}

/// Returns `true` if the line ends with a block scalar header (`|`, `>-`, ...).
pub(crate) fn opens_block_scalar(line: &str) -> bool {
    block_scalar_regex().is_match(line)
}

/// Finds the byte offset of a YAML comment in `text`, ignoring `#` inside
/// quoted scalars and `#` not preceded by whitespace.
pub(crate) fn find_comment(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut prev_significant: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' {
                    if chars.peek().is_some_and(|(_, n)| *n == '\'') {
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            Some(_) => {
                if c == '\\' {
                    chars.next();
                } else if c == '"' {
                    quote = None;
                }
            }
            None => {
                let at_scalar_start =
                    matches!(prev_significant, None | Some('-' | ':' | '[' | ',' | '{' | '?'));
                if (c == '\'' || c == '"') && at_scalar_start {
                    quote = Some(c);
                } else if c == '#' && prev.map_or(true, char::is_whitespace) {
                    return Some(i);
                }
            }
        }
        if !c.is_whitespace() {
            prev_significant = Some(c);
        }
        prev = Some(c);
    }
    None
}

/// Removes `n` leading spaces where present.
pub(crate) fn dedent(lines: &[String], n: usize) -> Vec<String> {
    lines
        .iter()
        .map(|l| {
            if indent_of(l) >= n {
                l[n..].to_string()
            } else {
                l.trim_start().to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert_eq!(mapping_key("build:").as_deref(), Some("build"));
        assert_eq!(mapping_key("  script: ./a.sh").as_deref(), Some("script"));
        assert_eq!(mapping_key(".hidden-job:").as_deref(), Some(".hidden-job"));
        assert_eq!(mapping_key("deploy:prod:").as_deref(), Some("deploy:prod"));
        assert_eq!(mapping_key("\"quoted key\": 1").as_deref(), Some("quoted key"));
        assert_eq!(mapping_key("'it''s': 1").as_deref(), Some("it's"));
        assert_eq!(mapping_key("job: &anchor").as_deref(), Some("job"));
        assert_eq!(mapping_key("<<: *defaults").as_deref(), Some("<<"));
        assert_eq!(mapping_key("- item: 1"), None);
        assert_eq!(mapping_key("# comment:"), None);
        assert_eq!(mapping_key("echo http://x"), None);
        assert_eq!(mapping_key("---"), None);
    }

    #[test]
    fn key_end_points_past_colon() {
        let line = "  script: ./a.sh";
        assert_eq!(&line[key_end(line).unwrap()..], " ./a.sh");
        let line = "job:";
        assert_eq!(&line[key_end(line).unwrap()..], "");
    }

    #[test]
    fn block_scalar_headers() {
        assert!(opens_block_scalar("  script: |"));
        assert!(opens_block_scalar("  script: >- # folded"));
        assert!(opens_block_scalar("    - |"));
        assert!(opens_block_scalar("  key: !tag |2"));
        assert!(!opens_block_scalar("  script: echo a | tee"));
        assert!(!opens_block_scalar("  - echo |"));
    }

    #[test]
    fn comments_outside_quotes() {
        assert_eq!(find_comment("./a.sh # note"), Some(7));
        assert_eq!(find_comment("\"a # b\""), None);
        assert_eq!(find_comment("'it''s # x' # y"), Some(12));
        assert_eq!(find_comment("echo a#b"), None);
        assert_eq!(find_comment("# whole"), Some(0));
        assert_eq!(find_comment("don't # here"), Some(6));
    }

    #[test]
    fn markers() {
        assert!(is_document_marker("---"));
        assert!(is_document_marker("--- # doc"));
        assert!(!is_document_marker("----"));
        assert!(is_sequence_item("  - a"));
        assert!(is_sequence_item("-"));
        assert!(!is_sequence_item("  -a"));
    }
}
