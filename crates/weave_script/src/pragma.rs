//! Pragma recognition and the line classification pre-pass.
//!
//! Pragmas are comments of the form `# Pragma: <command>` that steer the
//! inliner. Classification happens before any substitution so the
//! substitution pass only ever looks at a [`LineClass`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::error::ScriptError;

/// A line-steering pragma command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PragmaCommand {
    /// Leave this line alone.
    DoNotInline,
    /// Leave the following line alone.
    DoNotInlineNextLine,
    /// Leave every line up to the matching end marker alone.
    StartDoNotInline,
    /// Closes a disabled region.
    EndDoNotInline,
    /// Lift the containment check for this line only.
    AllowOutsideRoot,
}

fn pragma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)#\s*Pragma:\s*(do-not-inline(?:-next-line)?|start-do-not-inline|end-do-not-inline|allow-outside-root)",
        )
        .expect("pragma regex is valid")
    })
}

fn artifact_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*-?\s*#\s*Pragma:\s*inline-artifact\b(.*)$")
            .expect("artifact pragma regex is valid")
    })
}

/// Finds a line-steering pragma anywhere in `line`.
pub fn find_pragma(line: &str) -> Option<PragmaCommand> {
    let caps = pragma_regex().captures(line)?;
    let command = caps.get(1)?.as_str().to_ascii_lowercase();
    match command.as_str() {
        "do-not-inline" => Some(PragmaCommand::DoNotInline),
        "do-not-inline-next-line" => Some(PragmaCommand::DoNotInlineNextLine),
        "start-do-not-inline" => Some(PragmaCommand::StartDoNotInline),
        "end-do-not-inline" => Some(PragmaCommand::EndDoNotInline),
        "allow-outside-root" => Some(PragmaCommand::AllowOutsideRoot),
        _ => None,
    }
}

/// Archive formats the artifact packager can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// A zip archive, extracted with `unzip`.
    #[default]
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
    /// A bzip2-compressed tarball.
    TarBz2,
    /// An xz-compressed tarball.
    TarXz,
}

impl ArchiveFormat {
    /// The name used in pragmas and shim comments.
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarBz2 => "tar.bz2",
            ArchiveFormat::TarXz => "tar.xz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar.gz" => Ok(ArchiveFormat::TarGz),
            "tar.bz2" => Ok(ArchiveFormat::TarBz2),
            "tar.xz" => Ok(ArchiveFormat::TarXz),
            other => Err(format!(
                "unsupported format '{other}' (expected zip, tar.gz, tar.bz2 or tar.xz)"
            )),
        }
    }
}

/// A parsed `inline-artifact` pragma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDirective {
    /// File or directory to package, relative to the input root.
    pub source: String,
    /// Directory the shim extracts into.
    pub output: String,
    /// Archive format.
    pub format: ArchiveFormat,
    /// Leading path components removed from archive entry names.
    pub strip: u32,
}

/// Parses an `inline-artifact` pragma.
///
/// Returns `Ok(None)` when the line is not an artifact pragma at all, and an
/// error when it is one but the arguments are unusable.
pub fn parse_artifact_pragma(line: &str) -> Result<Option<ArtifactDirective>, ScriptError> {
    let Some(caps) = artifact_regex().captures(line) else {
        return Ok(None);
    };
    let bad = |reason: String| ScriptError::BadPragma {
        line: line.trim().to_string(),
        reason,
    };
    let args = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let mut words = args.split_whitespace();
    let source = words
        .next()
        .ok_or_else(|| bad("missing artifact path".to_string()))?
        .to_string();
    if source.starts_with("--") {
        return Err(bad(format!("expected an artifact path before '{source}'")));
    }

    let mut output = None;
    let mut format = ArchiveFormat::default();
    let mut strip = 0;
    for word in words {
        if let Some(value) = word.strip_prefix("--output=") {
            if value.is_empty() {
                return Err(bad("--output needs a value".to_string()));
            }
            output = Some(value.to_string());
        } else if let Some(value) = word.strip_prefix("--format=") {
            format = value.parse().map_err(bad)?;
        } else if let Some(value) = word.strip_prefix("--strip=") {
            strip = value
                .parse()
                .map_err(|_| bad(format!("--strip expects a number, got '{value}'")))?;
        } else {
            return Err(bad(format!("unexpected argument '{word}'")));
        }
    }

    let output = output.unwrap_or_else(|| default_output(&source));
    Ok(Some(ArtifactDirective {
        source,
        output,
        format,
        strip,
    }))
}

/// `./<last path component>` of the artifact source.
fn default_output(source: &str) -> String {
    let trimmed = source.trim_end_matches(&['/', '\\'][..]);
    let name = trimmed
        .rsplit(&['/', '\\'][..])
        .find(|part| !part.is_empty() && *part != ".")
        .unwrap_or("artifact");
    format!("./{name}")
}

/// The result of the classification pre-pass for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Eligible for substitution.
    Normal {
        /// The line carries `allow-outside-root`.
        allow_outside_root: bool,
    },
    /// Disabled by a pragma; emitted verbatim.
    Suppressed,
    /// A region or next-line marker; emitted verbatim.
    Directive,
    /// An `inline-artifact` pragma to hand to the artifact packager.
    Artifact(ArtifactDirective),
}

/// Classifies every line of a script-bearing field in order.
///
/// Disabled regions run from a `start-do-not-inline` marker to the matching
/// `end-do-not-inline`; an unterminated region extends to the last line.
pub fn classify_lines<'a, I>(lines: I) -> Result<Vec<LineClass>, ScriptError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut classes = Vec::new();
    let mut in_region = false;
    let mut skip_next = false;

    for line in lines {
        let class = match find_pragma(line) {
            Some(PragmaCommand::StartDoNotInline) => {
                in_region = true;
                LineClass::Directive
            }
            Some(PragmaCommand::EndDoNotInline) => {
                in_region = false;
                LineClass::Directive
            }
            _ if in_region => LineClass::Suppressed,
            _ if skip_next => {
                skip_next = false;
                LineClass::Suppressed
            }
            Some(PragmaCommand::DoNotInlineNextLine) => {
                skip_next = true;
                LineClass::Directive
            }
            Some(PragmaCommand::DoNotInline) => LineClass::Suppressed,
            Some(PragmaCommand::AllowOutsideRoot) => LineClass::Normal {
                allow_outside_root: true,
            },
            None => match parse_artifact_pragma(line)? {
                Some(directive) => LineClass::Artifact(directive),
                None => LineClass::Normal {
                    allow_outside_root: false,
                },
            },
        };
        classes.push(class);
    }

    if in_region {
        warn!("start-do-not-inline region is never closed; it extends to the end of the field");
    }
    Ok(classes)
}
