//! The comment block written above compiled documents.

use std::path::Path;

/// Builds the banner for a compiled document.
///
/// `custom` replaces the generated text when set; its lines are commented
/// if they are not already. The reproducing command never carries the
/// worker count, which depends on the host.
pub fn banner_lines(
    input_dir: &Path,
    output_dir: &Path,
    dry_run: bool,
    custom: Option<&str>,
) -> Vec<String> {
    if let Some(custom) = custom {
        return custom
            .lines()
            .map(|line| {
                if line.trim().is_empty() || line.trim_start().starts_with('#') {
                    line.to_string()
                } else {
                    format!("# {line}")
                }
            })
            .chain(std::iter::once(String::new()))
            .collect();
    }

    let mut command = format!(
        "weave compile --in {} --out {}",
        input_dir.display(),
        output_dir.display()
    );
    if dry_run {
        command.push_str(" --dry-run");
    }

    vec![
        "# DO NOT EDIT".to_string(),
        "# This file is generated by weave. Edit the sources and recompile:".to_string(),
        format!("#   {command}"),
        String::new(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn generated_banner_reproduces_the_command() {
        let lines = banner_lines(Path::new("src"), Path::new("out"), true, None);
        assert_eq!(lines[0], "# DO NOT EDIT");
        assert_eq!(lines[2], "#   weave compile --in src --out out --dry-run");
        assert_eq!(lines.last().map(String::as_str), Some(""));
    }

    #[test]
    fn custom_header_is_kept_as_comments() {
        let lines = banner_lines(
            Path::new("src"),
            Path::new("out"),
            false,
            Some("# managed by platform team\nask in #ci"),
        );
        assert_eq!(lines, vec!["# managed by platform team", "# ask in #ci", ""]);
    }
}
