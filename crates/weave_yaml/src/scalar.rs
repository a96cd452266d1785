//! Emitting strings as YAML scalars.

const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Renders `s` as a single-line scalar, quoting only when a plain scalar
/// would not read back as the same string.
pub fn render_scalar(s: &str) -> String {
    if s.chars().any(|c| c.is_control() && c != '\t') {
        return double_quoted(s);
    }
    if needs_quotes(s) {
        return format!("'{}'", s.replace('\'', "''"));
    }
    s.to_string()
}

fn needs_quotes(s: &str) -> bool {
    if s.is_empty()
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s.starts_with(INDICATORS)
        || s.contains(": ")
        || s.contains(" #")
        || s.contains('\t')
        || s.ends_with(':')
    {
        return true;
    }
    !matches!(
        serde_yaml::from_str::<serde_yaml::Value>(s),
        Ok(serde_yaml::Value::String(ref parsed)) if parsed == s
    )
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders multi-line `text` as a literal block scalar.
///
/// `head` is everything before the indicator (`"  script: "` or
/// `"    - "`); content lines are indented by `indent` spaces. Returns
/// `None` when the text cannot be represented without an explicit
/// indentation indicator, in which case the caller should fall back to
/// [`render_quoted_multiline`].
pub fn render_block_literal(head: &str, text: &str, indent: usize) -> Option<Vec<String>> {
    if text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
        return None;
    }
    let body = text.trim_end_matches('\n');
    let trailing = text.len() - body.len();
    let first = body.lines().find(|l| !l.trim().is_empty())?;
    if first.starts_with(char::is_whitespace) {
        return None;
    }
    let chomp = match trailing {
        0 => "|-",
        1 => "|",
        _ => "|+",
    };
    let pad = " ".repeat(indent);
    let mut out = vec![format!("{head}{chomp}")];
    for line in body.split('\n') {
        if line.is_empty() {
            out.push(String::new());
        } else {
            out.push(format!("{pad}{line}"));
        }
    }
    for _ in 1..trailing {
        out.push(String::new());
    }
    Some(out)
}

/// Double-quoted fallback for text that a block literal cannot carry.
pub fn render_quoted_multiline(text: &str) -> String {
    double_quoted(text)
}
