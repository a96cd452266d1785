//! Packaging files and directories as inline, self-extracting payloads.
//!
//! An `inline-artifact` pragma is replaced by a shim that assigns the
//! base64 of an archive to a scratch variable, creates the target
//! directory, decodes and extracts the archive, and unsets the variable.
//! Archives are deterministic: entries are sorted and carry fixed
//! timestamps and modes, so recompiling unchanged inputs yields identical
//! output. File permissions are not preserved.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, error, info, warn};
use weave_common::{is_within, normalize_lexically, relative_slash};
use weave_script::{parse_artifact_pragma, ArchiveFormat, ArtifactDirective};

use crate::error::CompileError;
use crate::shell::shell_quote;

/// Shell variable holding the encoded archive while it is extracted.
pub const ARTIFACT_VAR: &str = "__WEAVE_ARTIFACT";

/// Shim lines produced for one packaged artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactShim {
    /// Script lines replacing the pragma.
    pub lines: Vec<String>,
    /// The packaged file or directory.
    pub source: PathBuf,
}

/// Builds artifact shims for pragmas, resolving sources under `input_root`.
#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    input_root: PathBuf,
    max_bytes: u64,
    warn_bytes: u64,
}

impl ArtifactPackager {
    /// Creates a packager with the given size limits.
    pub fn new(input_root: impl Into<PathBuf>, max_bytes: u64, warn_bytes: u64) -> Self {
        Self {
            input_root: input_root.into(),
            max_bytes,
            warn_bytes,
        }
    }

    /// Packages the artifact named by `line` if it is an `inline-artifact`
    /// pragma.
    ///
    /// Returns `Ok(None)` when the line is not such a pragma, when the
    /// source lies outside the input root, or when it does not exist; the
    /// line then stays in the document unchanged.
    pub fn try_inline(&self, line: &str) -> Result<Option<ArtifactShim>, CompileError> {
        let directive = parse_artifact_pragma(line).map_err(|e| CompileError::Script {
            document: self.input_root.display().to_string(),
            source: e,
        })?;
        match directive {
            Some(directive) => self.package(&directive),
            None => Ok(None),
        }
    }

    /// Packages an already-parsed directive.
    pub fn package(
        &self,
        directive: &ArtifactDirective,
    ) -> Result<Option<ArtifactShim>, CompileError> {
        let source = normalize_lexically(&self.input_root.join(&directive.source));
        if Path::new(&directive.source).is_absolute() || !is_within(&source, &self.input_root) {
            error!(
                source = %directive.source,
                root = %self.input_root.display(),
                "Refusing to package artifact outside the input directory"
            );
            return Ok(None);
        }
        if !source.exists() {
            warn!(
                source = %source.display(),
                "Artifact source does not exist; leaving the pragma in place"
            );
            return Ok(None);
        }

        info!(source = %source.display(), format = %directive.format, "packaging artifact");
        let entries = collect_entries(&source, directive.strip)?;
        let archive = build_archive(&source, &entries, directive.format)?;

        let size = archive.len() as u64;
        if size > self.max_bytes {
            error!(
                source = %source.display(),
                size = %format_size(size),
                limit = %format_size(self.max_bytes),
                "Artifact too large"
            );
            return Err(CompileError::ArtifactTooLarge {
                source_path: source,
                size: format_size(size),
                limit: format_size(self.max_bytes),
            });
        }
        if size > self.warn_bytes {
            warn!(source = %source.display(), size = %format_size(size), "Large artifact");
        }

        let lines = extraction_shim(
            &STANDARD.encode(&archive),
            &directive.output,
            directive.format,
            &directive.source,
            &format_size(size),
        );
        Ok(Some(ArtifactShim { lines, source }))
    }
}

/// Files to archive as (entry name, path on disk), sorted by entry name.
fn collect_entries(source: &Path, strip: u32) -> Result<Vec<(String, PathBuf)>, CompileError> {
    if source.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        return Ok(vec![(name, source.to_path_buf())]);
    }

    let mut files = Vec::new();
    walk(source, &mut files).map_err(|e| CompileError::io(source, e))?;
    let mut entries = Vec::new();
    for file in files {
        let Some(rel) = relative_slash(&file, source) else {
            continue;
        };
        let parts: Vec<&str> = rel.split('/').collect();
        if parts.len() <= strip as usize {
            debug!(entry = %rel, strip, "entry removed entirely by --strip");
            continue;
        }
        entries.push((parts[strip as usize..].join("/"), file));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.dedup_by(|a, b| a.0 == b.0);
    Ok(entries)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn build_archive(
    source: &Path,
    entries: &[(String, PathBuf)],
    format: ArchiveFormat,
) -> Result<Vec<u8>, CompileError> {
    let fail = |reason: String| CompileError::Archive {
        source_path: source.to_path_buf(),
        reason,
    };
    let mut files = Vec::with_capacity(entries.len());
    for (name, path) in entries {
        let data = std::fs::read(path).map_err(|e| CompileError::io(path, e))?;
        files.push((name.as_str(), data));
    }
    match format {
        ArchiveFormat::Zip => zip_archive(&files).map_err(|e| fail(e.to_string())),
        ArchiveFormat::TarGz => {
            let encoder = flate2::GzBuilder::new()
                .mtime(0)
                .write(Vec::new(), flate2::Compression::default());
            tar_archive(encoder, &files)
                .and_then(|e| e.finish())
                .map_err(|e| fail(e.to_string()))
        }
        ArchiveFormat::TarBz2 => {
            let encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            tar_archive(encoder, &files)
                .and_then(|e| e.finish())
                .map_err(|e| fail(e.to_string()))
        }
        ArchiveFormat::TarXz => {
            let encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            tar_archive(encoder, &files)
                .and_then(|e| e.finish())
                .map_err(|e| fail(e.to_string()))
        }
    }
}

fn zip_archive(files: &[(&str, Vec<u8>)]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    for (name, data) in files {
        writer.start_file(*name, options)?;
        writer.write_all(data)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn tar_archive<W: Write>(inner: W, files: &[(&str, Vec<u8>)]) -> std::io::Result<W> {
    let mut builder = tar::Builder::new(inner);
    builder.mode(tar::HeaderMode::Deterministic);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_cksum();
        builder.append_data(&mut header, *name, data.as_slice())?;
    }
    builder.into_inner()
}

/// Script lines that unpack `encoded` into `output` at job run time.
pub fn extraction_shim(
    encoded: &str,
    output: &str,
    format: ArchiveFormat,
    source_display: &str,
    size_display: &str,
) -> Vec<String> {
    let out = shell_quote(output);
    let mut lines = vec![
        format!("# >>> BEGIN inline-artifact: {source_display} ({format}, {size_display})"),
        format!("{ARTIFACT_VAR}='{encoded}'"),
        format!("mkdir -p {out}"),
    ];
    let decode = format!("printf '%s' \"${ARTIFACT_VAR}\" | base64 -d");
    match format {
        ArchiveFormat::Zip => {
            let tmp = "\"${TMPDIR:-/tmp}/__weave_artifact.zip\"";
            lines.push(format!("{decode} > {tmp}"));
            lines.push(format!("unzip -q -o {tmp} -d {out}"));
            lines.push(format!("rm -f {tmp}"));
        }
        ArchiveFormat::TarGz | ArchiveFormat::TarBz2 | ArchiveFormat::TarXz => {
            let flag = match format {
                ArchiveFormat::TarGz => 'z',
                ArchiveFormat::TarBz2 => 'j',
                _ => 'J',
            };
            lines.push(format!("{decode} | tar -x{flag}f - -C {out} --no-same-owner"));
        }
    }
    lines.push(format!("unset {ARTIFACT_VAR}"));
    lines.push("# <<< END inline-artifact".to_string());
    lines
}

/// Formats a byte count like `847 bytes`, `1.2KB` or `3.4MB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} bytes")
    } else if b < KB * KB {
        format!("{:.1}KB", b / KB)
    } else {
        format!("{:.1}MB", b / (KB * KB))
    }
}
