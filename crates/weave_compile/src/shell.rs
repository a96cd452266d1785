//! Shell quoting for generated command lines.

const SAFE: [char; 14] = [
    '_', '-', '.', '/', ':', '=', '+', '@', ',', '%', '$', '{', '}', '~',
];

/// Quotes `s` for POSIX shells unless it is made only of safe characters.
///
/// Variable references (`$CI_PROJECT_DIR/x`) count as safe so they still
/// expand when the job runs.
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || SAFE.contains(&c));
    if safe {
        s.to_string()
    } else {
        single_quote(s)
    }
}

/// Wraps `s` in single quotes, splicing embedded quotes as `'"'"'`.
pub fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}
