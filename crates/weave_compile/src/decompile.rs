//! Decompilation: moving inline scripts and variables back out into files.
//!
//! Every script-bearing field of every job becomes `<job>[_<field>].sh`
//! next to the rewritten document, and the field is replaced by a call to
//! that file. Scalar `variables:` mappings become variable files. The result
//! compiles back to an equivalent document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info, warn};
use weave_common::relative_slash;
use weave_script::{is_identifier, job_variable_file_name, GLOBAL_VARIABLES_FILE};
use weave_source::discover_documents;
use weave_yaml::{read_variables, render_scalar, validate_structure, Document, Piece, Section, SCRIPT_KEYS};

use crate::error::CompileError;

/// First line of every extracted script.
pub const SHEBANG: &str = "#!/bin/bash";

/// Helper script defining the predefined CI variables for local runs.
pub const MOCK_CI_VARIABLES_FILE: &str = "mock_ci_variables.sh";

const MOCK_CI_VARIABLES: &[(&str, &str)] = &[
    ("CI", "true"),
    ("GITLAB_CI", "true"),
    ("CI_SERVER_URL", "https://gitlab.example.com"),
    ("CI_PROJECT_NAME", "example-project"),
    ("CI_PROJECT_PATH", "group/example-project"),
    ("CI_PROJECT_DIR", "$PWD"),
    ("CI_REGISTRY_IMAGE", "registry.example.com/group/example-project"),
    ("CI_DEFAULT_BRANCH", "main"),
    ("CI_COMMIT_BRANCH", "main"),
    ("CI_COMMIT_REF_NAME", "main"),
    ("CI_COMMIT_SHA", "0000000000000000000000000000000000000000"),
    ("CI_COMMIT_SHORT_SHA", "00000000"),
    ("CI_PIPELINE_ID", "1"),
    ("CI_PIPELINE_SOURCE", "push"),
    ("CI_JOB_ID", "1"),
    ("CI_JOB_NAME", "local"),
    ("CI_JOB_STAGE", "test"),
];

/// Totals for one decompile run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompileSummary {
    /// Jobs with at least one script-bearing field.
    pub jobs_processed: usize,
    /// Script files extracted.
    pub scripts_written: usize,
    /// Every file created (or, in a dry run, that would be).
    pub files_created: usize,
    /// Rewritten documents.
    pub documents: Vec<PathBuf>,
}

/// Files planned for one run, keyed by path.
#[derive(Default)]
struct Plan {
    files: BTreeMap<PathBuf, PlannedFile>,
    summary: DecompileSummary,
}

struct PlannedFile {
    content: String,
    executable: bool,
}

impl Plan {
    /// Claims `path` for `content`. Returns `false` if another document
    /// already claimed it with different content.
    fn claim(&mut self, path: PathBuf, content: String, executable: bool) -> bool {
        match self.files.get(&path) {
            Some(existing) => existing.content == content,
            None => {
                self.files.insert(path, PlannedFile { content, executable });
                true
            }
        }
    }
}

/// Derives the script file name for a job field: the job name lowercased,
/// whitespace turned into `-`, and anything outside `[a-z0-9._-]` dropped.
/// `script` gets no suffix; other fields are appended as `_<field>`.
pub fn create_script_filename(job: &str, key: &str) -> String {
    let base: String = job
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('-'),
            'a'..='z' | '0'..='9' | '.' | '_' | '-' => Some(c),
            _ => None,
        })
        .collect();
    if key == "script" {
        format!("{base}.sh")
    } else {
        format!("{base}_{key}.sh")
    }
}

/// Decompiles `input` (one document or a directory of documents) into
/// `output_dir`.
pub fn run_decompile(
    input: &Path,
    output_dir: &Path,
    dry_run: bool,
) -> Result<DecompileSummary, CompileError> {
    let documents: Vec<(PathBuf, PathBuf)> = if input.is_dir() {
        let found = discover_documents(input)?;
        if found.is_empty() {
            return Err(CompileError::NoDocuments {
                path: input.to_path_buf(),
            });
        }
        found
            .into_iter()
            .filter_map(|path| {
                let rel = relative_slash(&path, input)?;
                let out = output_dir.join(rel);
                Some((path, out))
            })
            .collect()
    } else if input.is_file() {
        let name = input.file_name().unwrap_or(input.as_os_str());
        vec![(input.to_path_buf(), output_dir.join(name))]
    } else {
        return Err(CompileError::InputFileNotFound {
            path: input.to_path_buf(),
        });
    };

    let mut plan = Plan::default();
    for (path, out_yaml) in &documents {
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        let rel = path.display().to_string();
        let mut doc = Document::parse(&text).map_err(|e| CompileError::Yaml {
            document: rel.clone(),
            source: e,
        })?;
        if doc.is_opaque() {
            warn!(document = %rel, "document is not a mapping; skipping");
            continue;
        }
        if decompile_document(&mut doc, out_yaml, &mut plan) {
            let rendered = doc.render();
            validate_structure(&rendered).map_err(|e| CompileError::InvalidOutput {
                path: out_yaml.clone(),
                reason: e.to_string(),
            })?;
            plan.claim(out_yaml.clone(), rendered, false);
            plan.summary.documents.push(out_yaml.clone());
        } else {
            debug!(document = %rel, "nothing to decompile");
        }
    }

    let mut summary = std::mem::take(&mut plan.summary);
    summary.files_created = plan.files.len();
    if dry_run {
        for path in plan.files.keys() {
            info!(path = %path.display(), "dry run: would write");
        }
        return Ok(summary);
    }

    for (path, file) in &plan.files {
        write_file(path, &file.content, file.executable)?;
    }
    write_file(
        &output_dir.join(MOCK_CI_VARIABLES_FILE),
        &mock_ci_variables(),
        true,
    )?;
    summary.files_created += 1;
    info!(
        jobs = summary.jobs_processed,
        scripts = summary.scripts_written,
        files = summary.files_created,
        "decompile finished"
    );
    Ok(summary)
}

/// Rewrites `doc` in place and adds its extracted files to `plan`.
/// Returns `true` if the document changed.
fn decompile_document(doc: &mut Document, out_yaml: &Path, plan: &mut Plan) -> bool {
    let dir = out_yaml.parent().unwrap_or(Path::new("")).to_path_buf();
    let stem = out_yaml
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ci")
        .to_string();
    let mut changed = false;

    if let Some(section) = doc.section("variables") {
        if let Some(content) = variable_file_content(section) {
            if plan.claim(dir.join(GLOBAL_VARIABLES_FILE), content, false) {
                doc.remove_section("variables");
                changed = true;
            } else {
                warn!(document = %out_yaml.display(), "another document already defines global variables here; keeping them inline");
            }
        }
    }

    for section in doc.sections_mut() {
        let job = section.key().to_string();
        let Some(mut children) = section.children() else {
            continue;
        };
        let has_script = children
            .iter()
            .any(|p| matches!(p, Piece::Section(s) if SCRIPT_KEYS.contains(&s.key())));
        if !has_script {
            continue;
        }
        plan.summary.jobs_processed += 1;
        let mut job_changed = false;

        for child in children.iter_mut() {
            let Piece::Section(field) = child else {
                continue;
            };
            if !SCRIPT_KEYS.contains(&field.key()) {
                continue;
            }
            let Some(lines) = script_lines(field) else {
                continue;
            };
            let content = format!("{SHEBANG}\n\n{}\n", lines.join("\n"));
            let mut name = create_script_filename(&job, field.key());
            if !plan.claim(dir.join(&name), content.clone(), true) {
                name = format!("{stem}_{name}");
                if !plan.claim(dir.join(&name), content, true) {
                    warn!(job = %job, key = field.key(), "script file name is taken; leaving the field inline");
                    continue;
                }
            }
            let key_line = match field.key_comment() {
                Some(comment) => format!(
                    "{} {} {comment}",
                    field.key_prefix(),
                    render_scalar(&format!("./{name}"))
                ),
                None => format!("{} {}", field.key_prefix(), render_scalar(&format!("./{name}"))),
            };
            field.replace_all(key_line, Vec::new());
            plan.summary.scripts_written += 1;
            job_changed = true;
        }

        let vars_at = children
            .iter()
            .position(|p| matches!(p, Piece::Section(s) if s.key() == "variables"));
        if let Some(at) = vars_at {
            if let Piece::Section(vars) = &children[at] {
                if let Some(content) = variable_file_content(vars) {
                    if plan.claim(dir.join(job_variable_file_name(&job)), content, false) {
                        children.remove(at);
                        job_changed = true;
                    }
                }
            }
        }

        if job_changed {
            section.set_children(&children);
            changed = true;
        }
    }
    changed
}

/// The script lines of a field, or `None` when it is empty, tagged, or holds
/// anything other than strings.
fn script_lines(field: &Section) -> Option<Vec<String>> {
    let value = field.parse_value().ok()?;
    let mut lines = Vec::new();
    match value {
        Value::String(s) => lines.extend(s.lines().map(String::from)),
        Value::Sequence(items) => {
            for item in items {
                let Value::String(s) = item else {
                    return None;
                };
                lines.extend(s.lines().map(String::from));
            }
        }
        _ => return None,
    }
    (!lines.is_empty()).then_some(lines)
}

/// Renders a `variables:` section as a variable file, if every entry is a
/// scalar with an identifier key and a value the file format can carry.
fn variable_file_content(section: &Section) -> Option<String> {
    let view = read_variables(section)?;
    if !view.all_scalar() || view.scalars.is_empty() {
        return None;
    }
    let mut out = String::new();
    for (key, value) in view.scalars.iter() {
        if !is_identifier(key) || value.contains('\n') {
            return None;
        }
        let quoted = if !value.contains('"') {
            format!("\"{value}\"")
        } else if !value.contains('\'') {
            format!("'{value}'")
        } else {
            return None;
        };
        out.push_str(&format!("{key}={quoted}\n"));
    }
    Some(out)
}

fn mock_ci_variables() -> String {
    let mut out = String::from(SHEBANG);
    out.push_str("\n# Predefined CI variables for running extracted scripts locally.\n");
    out.push_str("# Values already set in the environment win.\n\n");
    for (name, value) in MOCK_CI_VARIABLES {
        out.push_str(&format!("export {name}=\"${{{name}:-{value}}}\"\n"));
    }
    out
}

fn write_file(path: &Path, content: &str, executable: bool) -> Result<(), CompileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CompileError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| CompileError::io(path, e))?;
    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| CompileError::io(path, e))?
            .permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(path, perms).map_err(|e| CompileError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = executable;
    debug!(path = %path.display(), "wrote");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
stages:
  - build
  - test

variables:
  GLOBAL_VAR: "some_value"

# A job with a simple script list.
job_simple_script:
  stage: build
  script:
    - echo "Hello World"
    - ls -la

job_with_before_script:
  stage: build
  before_script:
    - echo "Setting up..."
  script: echo "Main task"

job_with_all_scripts:
  stage: test
  before_script:
    - export VAR="before"
    - echo $VAR
  script: |
    echo "This is a multi-line script."
    echo "It does important things."
  after_script:
    - echo "Cleaning up..."

job_with_empty_script:
  stage: test
  script:

job_no_script:
  stage: test
  image: alpine

.hidden_job:
  script:
    - echo "This should be extracted"
"#;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input/.gitlab-ci.yml");
        std::fs::create_dir_all(input.parent().unwrap()).unwrap();
        std::fs::write(&input, SAMPLE).unwrap();
        let out = dir.path().join("output");
        (dir, input, out)
    }

    #[test]
    fn script_file_names() {
        let cases = [
            ("my-job", "script", "my-job.sh"),
            ("my job", "script", "my-job.sh"),
            ("job_with_underscores", "script", "job_with_underscores.sh"),
            ("My-Job With.Special-Chars!", "script", "my-job-with.special-chars.sh"),
            ("my-job", "before_script", "my-job_before_script.sh"),
            ("my-job", "after_script", "my-job_after_script.sh"),
            (".hidden-job", "script", ".hidden-job.sh"),
        ];
        for (job, key, expected) in cases {
            assert_eq!(create_script_filename(job, key), expected);
        }
    }

    #[test]
    fn extracts_scripts_and_variables() {
        let (_dir, input, out) = setup();
        let summary = run_decompile(&input, &out, false).unwrap();
        assert_eq!(summary.jobs_processed, 5);
        assert_eq!(summary.scripts_written, 7);
        // 7 scripts, the document, global variables, and the mock CI helper
        assert_eq!(summary.files_created, 10);

        let yaml = out.join(".gitlab-ci.yml");
        let value: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&yaml).unwrap()).unwrap();
        assert_eq!(value["job_simple_script"]["script"].as_str(), Some("./job_simple_script.sh"));
        assert_eq!(
            value["job_with_before_script"]["before_script"].as_str(),
            Some("./job_with_before_script_before_script.sh")
        );
        assert_eq!(
            value[".hidden_job"]["script"].as_str(),
            Some("./.hidden_job.sh")
        );
        assert!(value["job_with_empty_script"]["script"].is_null());
        assert!(value.get("variables").is_none());

        let script = std::fs::read_to_string(out.join("job_with_all_scripts.sh")).unwrap();
        assert_eq!(
            script,
            "#!/bin/bash\n\necho \"This is a multi-line script.\"\necho \"It does important things.\"\n"
        );
        assert_eq!(
            std::fs::read_to_string(out.join(GLOBAL_VARIABLES_FILE)).unwrap(),
            "GLOBAL_VAR=\"some_value\"\n"
        );
        assert!(std::fs::read_to_string(out.join(MOCK_CI_VARIABLES_FILE))
            .unwrap()
            .contains("export CI="));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(out.join("job_simple_script.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_ne!(mode & 0o100, 0);
        }
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let (_dir, input, out) = setup();
        let summary = run_decompile(&input, &out, true).unwrap();
        assert_eq!(summary.jobs_processed, 5);
        assert_eq!(summary.files_created, 9);
        assert!(!out.exists());
    }

    #[test]
    fn nothing_to_extract_writes_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ci.yml");
        std::fs::write(&input, "job_a:\n  image: node\njob_b:\n  stage: test\n").unwrap();
        let out = dir.path().join("out");
        let summary = run_decompile(&input, &out, false).unwrap();
        assert_eq!(summary.jobs_processed, 0);
        assert!(!out.join("ci.yml").exists());
        assert!(out.join(MOCK_CI_VARIABLES_FILE).exists());
    }

    #[test]
    fn reference_fields_stay_inline() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ci.yml");
        std::fs::write(
            &input,
            "job:\n  script:\n    - !reference [.setup, script]\n    - echo hi\n  variables:\n    NESTED:\n      value: x\n",
        )
        .unwrap();
        let summary = run_decompile(&input, &dir.path().join("out"), true).unwrap();
        assert_eq!(summary.jobs_processed, 1);
        assert_eq!(summary.scripts_written, 0);
        assert!(summary.documents.is_empty());
    }

    #[test]
    fn missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_decompile(&dir.path().join("nope.yml"), dir.path(), false).unwrap_err();
        assert!(err.to_string().starts_with("Input YAML file not found"));
    }
}
