//! The inlining engine: rewrites one pipeline document.
//!
//! For every job-like entry (a mapping with a `script`, `before_script` or
//! `after_script` child) and every top-level script field, each command is
//! classified for pragmas, then offered in turn to the artifact packager,
//! the interpreter packager, and the safe reference parser. Matches are
//! replaced by their content between inline markers. Variable files are
//! merged into the document's `variables:` mappings, with keys already in
//! the document left alone.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, error, warn};
use weave_common::{is_within, normalize_lexically, to_slash};
use weave_script::{
    classify_lines, job_variable_file_name, load_variable_file, parse_reference, strip_preamble,
    LineClass, ScriptError, ScriptReader, VariableSet, INLINE_BEGIN, INLINE_END,
};
use weave_source::ScriptSourceMap;
use weave_yaml::{
    add_variables, new_variables_section, read_variables, Document, Piece, ScriptField,
    ScriptNode, Section, PRIORITY_KEYS, SCRIPT_KEYS,
};

use crate::artifact::ArtifactPackager;
use crate::error::CompileError;
use crate::interpreter::{InterpreterOffer, InterpreterPackager};

/// Consecutive plain commands at or above this count are merged into one
/// block literal.
pub const COLLAPSE_THRESHOLD: usize = 3;

/// The result of compiling one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDocument {
    /// Rendered document text, without a banner.
    pub text: String,
    /// Number of substitutions made (scripts, artifacts, interpreter
    /// programs, and variable merges).
    pub inlined: usize,
    /// References and interpreter invocations left in place because they
    /// escape the scripts root.
    pub refused: Vec<String>,
}

/// Everything a document compilation reads.
pub struct Inliner<'a> {
    input_root: &'a Path,
    sources: &'a ScriptSourceMap,
    global_vars: &'a VariableSet,
    artifacts: ArtifactPackager,
    interpreters: InterpreterPackager,
}

/// Accumulated results while walking one document.
struct Pass<'d> {
    document: &'d str,
    inlined: usize,
    refused: Vec<String>,
}

impl Pass<'_> {
    fn script_error(&self, source: ScriptError) -> CompileError {
        CompileError::Script {
            document: self.document.to_string(),
            source,
        }
    }
}

impl<'a> Inliner<'a> {
    /// Creates an inliner. Scripts and variable files are looked up under
    /// `input_root`; `sources` must already hold every script there.
    pub fn new(
        input_root: &'a Path,
        sources: &'a ScriptSourceMap,
        global_vars: &'a VariableSet,
        artifacts: ArtifactPackager,
        interpreters: InterpreterPackager,
    ) -> Self {
        Self {
            input_root,
            sources,
            global_vars,
            artifacts,
            interpreters,
        }
    }

    /// Compiles `text`, the content of the document at `document`.
    pub fn compile(&self, document: &str, text: &str) -> Result<CompiledDocument, CompileError> {
        let mut doc = Document::parse(text).map_err(|e| CompileError::Yaml {
            document: document.to_string(),
            source: e,
        })?;
        let mut pass = Pass {
            document,
            inlined: 0,
            refused: Vec::new(),
        };

        if !doc.is_opaque() {
            self.merge_global_variables(&mut doc, &mut pass);
            for section in doc.sections_mut() {
                if SCRIPT_KEYS.contains(&section.key()) {
                    self.rewrite_field(section, &mut pass)?;
                } else if let Some(mut children) = job_children(section) {
                    let job = section.key().to_string();
                    self.merge_job_variables(&job, section.indent(), &mut children, &mut pass)?;
                    for child in children.iter_mut() {
                        if let Piece::Section(field) = child {
                            if SCRIPT_KEYS.contains(&field.key()) {
                                self.rewrite_field(field, &mut pass)?;
                            }
                        }
                    }
                    section.set_children(&children);
                }
            }
            doc.hoist_keys(&PRIORITY_KEYS);
        }

        Ok(CompiledDocument {
            text: doc.render(),
            inlined: pass.inlined,
            refused: pass.refused,
        })
    }

    fn merge_global_variables(&self, doc: &mut Document, pass: &mut Pass) {
        if self.global_vars.is_empty() {
            return;
        }
        match doc.section_mut("variables") {
            Some(section) => {
                if merge_into(section, self.global_vars) {
                    pass.inlined += 1;
                }
            }
            None => {
                doc.push_section(new_variables_section(self.global_vars, 0));
                pass.inlined += 1;
            }
        }
    }

    fn merge_job_variables(
        &self,
        job: &str,
        job_indent: usize,
        children: &mut Vec<Piece>,
        pass: &mut Pass,
    ) -> Result<(), CompileError> {
        let path = self.input_root.join(job_variable_file_name(job));
        let vars = match load_variable_file(&path).map_err(|e| pass.script_error(e))? {
            Some(vars) if !vars.is_empty() => vars,
            _ => return Ok(()),
        };
        debug!(job, file = %path.display(), count = vars.len(), "merging job variable file");

        let existing = children.iter_mut().find_map(|p| match p {
            Piece::Section(s) if s.key() == "variables" => Some(s),
            _ => None,
        });
        match existing {
            Some(section) => {
                if merge_into(section, &vars) {
                    pass.inlined += 1;
                }
            }
            None => {
                let indent = children
                    .iter()
                    .find_map(|p| match p {
                        Piece::Section(s) => Some(s.indent()),
                        Piece::Gap(_) => None,
                    })
                    .unwrap_or(job_indent + 2);
                let at = children
                    .iter()
                    .position(|p| matches!(p, Piece::Section(s) if SCRIPT_KEYS.contains(&s.key())))
                    .unwrap_or(children.len());
                children.insert(at, Piece::Section(new_variables_section(&vars, indent)));
                pass.inlined += 1;
            }
        }
        Ok(())
    }

    /// Rewrites one script field in place if anything in it changes.
    fn rewrite_field(&self, section: &mut Section, pass: &mut Pass) -> Result<(), CompileError> {
        let Some(field) = ScriptField::parse(section) else {
            debug!(key = section.key(), "script field left as written");
            return Ok(());
        };
        let Some(nodes) = self.process_nodes(&field.nodes, pass)? else {
            return Ok(());
        };
        let mut lines = field.render(&nodes).into_iter();
        if let Some(key_line) = lines.next() {
            section.replace_all(key_line, lines.collect());
        }
        Ok(())
    }

    /// Returns the new node list, or `None` if nothing changed.
    fn process_nodes(
        &self,
        nodes: &[ScriptNode],
        pass: &mut Pass,
    ) -> Result<Option<Vec<ScriptNode>>, CompileError> {
        let texts: Vec<String> = nodes
            .iter()
            .map(|n| n.pragma_text().unwrap_or_default())
            .collect();
        let classes =
            classify_lines(texts.iter().map(String::as_str)).map_err(|e| pass.script_error(e))?;

        let mut out: Vec<ScriptNode> = Vec::with_capacity(nodes.len());
        let mut changed = false;
        for (node, class) in nodes.iter().zip(classes) {
            let replacement = match class {
                LineClass::Artifact(directive) => self
                    .artifacts
                    .package(&directive)?
                    .map(|shim| texts_of(shim.lines)),
                LineClass::Normal { allow_outside_root } => match node.command() {
                    Some(command) => self.substitute(command, allow_outside_root, pass)?,
                    None => None,
                },
                LineClass::Suppressed | LineClass::Directive => None,
            };
            match replacement {
                Some(new_nodes) => {
                    pass.inlined += 1;
                    changed = true;
                    out.extend(new_nodes);
                }
                None => match node {
                    ScriptNode::Text(s) if s.contains('\n') => match reference_list(s) {
                        Some(refs) => {
                            changed = true;
                            out.extend(refs);
                        }
                        None => out.push(node.clone()),
                    },
                    _ => out.push(node.clone()),
                },
            }
        }
        Ok(changed.then(|| collapse(out)))
    }

    /// Tries the interpreter packager, then the safe reference parser.
    fn substitute(
        &self,
        command: &str,
        allow_outside_root: bool,
        pass: &mut Pass,
    ) -> Result<Option<Vec<ScriptNode>>, CompileError> {
        if command.contains('\n') {
            return Ok(None);
        }
        match self.interpreters.try_inline(command, allow_outside_root) {
            InterpreterOffer::Inlined(shim) => return Ok(Some(texts_of(shim.lines))),
            InterpreterOffer::Refused(path) => {
                error!(
                    document = pass.document,
                    command,
                    path = %path.display(),
                    root = %self.input_root.display(),
                    "Refusing to inline interpreter script outside the scripts root"
                );
                pass.refused.push(command.trim().to_string());
                return Ok(None);
            }
            InterpreterOffer::Declined => {}
        }
        let Some(reference) = parse_reference(command) else {
            return Ok(None);
        };

        let rel = normalize_lexically(Path::new(&reference.path));
        let resolved = normalize_lexically(&self.input_root.join(&rel));
        let inside = !rel.is_absolute() && is_within(&resolved, self.input_root);
        if !inside {
            if !allow_outside_root {
                error!(
                    document = pass.document,
                    reference = %reference.raw,
                    root = %self.input_root.display(),
                    "Refusing to inline script outside the scripts root"
                );
                pass.refused.push(reference.raw);
                return Ok(None);
            }
            let outside = if rel.is_absolute() { rel } else { resolved };
            let lines = read_outside(&outside, &reference.raw).map_err(|e| pass.script_error(e))?;
            return Ok(Some(wrap(&to_slash(&outside), lines)));
        }

        let rel = to_slash(&rel);
        let lines = ScriptReader::new(self.sources)
            .expand(&rel, &reference.raw)
            .map_err(|e| pass.script_error(e))?;
        Ok(Some(wrap(&rel, lines)))
    }
}

fn job_children(section: &Section) -> Option<Vec<Piece>> {
    let children = section.children()?;
    let is_job = children
        .iter()
        .any(|p| matches!(p, Piece::Section(s) if SCRIPT_KEYS.contains(&s.key())));
    is_job.then_some(children)
}

/// Adds the keys of `layer` that `section` does not define. Returns `true`
/// if anything was added.
fn merge_into(section: &mut Section, layer: &VariableSet) -> bool {
    let Some(view) = read_variables(section) else {
        warn!(key = section.key(), "variables is not a mapping; not merging variable files");
        return false;
    };
    let additions: VariableSet = layer
        .iter()
        .filter(|(k, _)| !view.defines(k))
        .collect();
    if additions.is_empty() {
        return false;
    }
    add_variables(section, &additions);
    true
}

fn read_outside(path: &Path, reference: &str) -> Result<Vec<String>, ScriptError> {
    debug!(path = %path.display(), "inlining script outside the root as allowed by pragma");
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScriptError::MissingScript {
            reference: reference.to_string(),
            path: path.to_path_buf(),
        },
        _ => ScriptError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let body = strip_preamble(&content.replace("\r\n", "\n")).trim().to_string();
    if body.is_empty() {
        return Err(ScriptError::EmptyScript {
            reference: reference.to_string(),
        });
    }
    Ok(body.lines().map(String::from).collect())
}

fn wrap(label: &str, lines: Vec<String>) -> Vec<ScriptNode> {
    let mut out = Vec::with_capacity(lines.len() + 2);
    out.push(ScriptNode::Text(format!("{INLINE_BEGIN} {label}")));
    out.extend(lines.into_iter().map(ScriptNode::Text));
    out.push(ScriptNode::Text(INLINE_END.to_string()));
    out
}

fn texts_of(lines: Vec<String>) -> Vec<ScriptNode> {
    lines.into_iter().map(ScriptNode::Text).collect()
}

fn reference_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\.?[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z_][A-Za-z0-9_-]*)+$")
            .expect("reference token regex is valid")
    })
}

/// Turns a block of `job.field` lines into `!reference` nodes.
fn reference_list(text: &str) -> Option<Vec<ScriptNode>> {
    let tokens: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if tokens.is_empty() || !tokens.iter().all(|t| reference_token_regex().is_match(t)) {
        return None;
    }
    tokens
        .into_iter()
        .map(|t| {
            let (job, field) = t.rsplit_once('.')?;
            Some(ScriptNode::Reference {
                job: job.to_string(),
                field: field.to_string(),
            })
        })
        .collect()
}

/// Merges runs of plain commands into single multi-line commands.
///
/// A run is merged when it has at least [`COLLAPSE_THRESHOLD`] entries or
/// contains an embedded newline. Any non-plain node ends the run.
pub fn collapse(nodes: Vec<ScriptNode>) -> Vec<ScriptNode> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut run: Vec<String> = Vec::new();

    fn flush(run: &mut Vec<String>, out: &mut Vec<ScriptNode>) {
        if run.len() >= COLLAPSE_THRESHOLD || run.iter().any(|s| s.contains('\n')) {
            let last = run.len() - 1;
            let joined = run
                .iter()
                .enumerate()
                .map(|(i, s)| if i < last { s.trim_end_matches('\n') } else { s.as_str() })
                .collect::<Vec<_>>()
                .join("\n");
            out.push(ScriptNode::Text(joined));
            run.clear();
        } else {
            out.extend(run.drain(..).map(ScriptNode::Text));
        }
    }

    for node in nodes {
        match node {
            ScriptNode::Text(s) => run.push(s),
            other => {
                flush(&mut run, &mut out);
                out.push(other);
            }
        }
    }
    flush(&mut run, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixture {
        dir: tempfile::TempDir,
        sources: ScriptSourceMap,
        globals: VariableSet,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for (rel, content) in files {
                let path = dir.path().join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, content).unwrap();
            }
            let sources = ScriptSourceMap::collect(dir.path()).unwrap();
            Self {
                dir,
                sources,
                globals: VariableSet::new(),
            }
        }

        fn compile(&self, text: &str) -> Result<CompiledDocument, CompileError> {
            let root = self.dir.path();
            Inliner::new(
                root,
                &self.sources,
                &self.globals,
                ArtifactPackager::new(root, 1024 * 1024, 100 * 1024),
                InterpreterPackager::new(root, 10_000),
            )
            .compile("ci.yml", text)
        }
    }

    #[test]
    fn three_line_script_becomes_block_literal() {
        let fx = Fixture::new(&[("build.sh", "echo one\necho two\necho three\n")]);
        let out = fx.compile("build:\n  script: [\"./build.sh\"]\n").unwrap();
        assert_eq!(out.inlined, 1);
        assert_eq!(
            out.text,
            "build:\n  script: |-\n    # >>> BEGIN inline: build.sh\n    echo one\n    echo two\n    echo three\n    # <<< END inline\n"
        );
        let value: serde_yaml::Value = serde_yaml::from_str(&out.text).unwrap();
        let script = value["build"]["script"].as_str().unwrap();
        assert!(script.contains("echo one\necho two\necho three"));
    }

    #[test]
    fn untouched_items_keep_their_formatting() {
        let fx = Fixture::new(&[("a.sh", "make")]);
        let text = "test:\n  image: alpine  # pinned\n  script:\n    - echo 'before'   # note\n    - !reference [.setup, script]\n    - ./a.sh\n";
        let out = fx.compile(text).unwrap();
        assert_eq!(
            out.text,
            "test:\n  image: alpine  # pinned\n  script:\n    - echo 'before'   # note\n    - !reference [.setup, script]\n    - |-\n      # >>> BEGIN inline: a.sh\n      make\n      # <<< END inline\n"
        );
    }

    #[test]
    fn short_runs_stay_as_list_items() {
        let nodes = vec![
            ScriptNode::Text("a".into()),
            ScriptNode::Text("b".into()),
            ScriptNode::Raw(vec!["- !reference [x, y]".into()]),
            ScriptNode::Text("c".into()),
            ScriptNode::Text("d".into()),
            ScriptNode::Text("e".into()),
        ];
        assert_eq!(
            collapse(nodes),
            vec![
                ScriptNode::Text("a".into()),
                ScriptNode::Text("b".into()),
                ScriptNode::Raw(vec!["- !reference [x, y]".into()]),
                ScriptNode::Text("c\nd\ne".into()),
            ]
        );
        assert_eq!(
            collapse(vec![ScriptNode::Text("x\ny".into()), ScriptNode::Text("z".into())]),
            vec![ScriptNode::Text("x\ny\nz".into())]
        );
        assert_eq!(
            collapse(vec![ScriptNode::Text("x\ny\n".into()), ScriptNode::Text("z".into())]),
            vec![ScriptNode::Text("x\ny\nz".into())]
        );
    }

    #[test]
    fn parameterized_calls_are_not_inlined() {
        let fx = Fixture::new(&[("deploy.sh", "echo deploy")]);
        let text = "deploy:\n  script:\n    - ./deploy.sh --prod\n    - ENV=prod ./deploy.sh\n";
        let out = fx.compile(text).unwrap();
        assert_eq!(out.inlined, 0);
        assert_eq!(out.text, text);
    }

    #[test]
    fn pragmas_disable_inlining() {
        let fx = Fixture::new(&[("a.sh", "echo a")]);
        let text = "job:\n  script:\n    - ./a.sh # Pragma: do-not-inline\n    - \"# Pragma: do-not-inline-next-line\"\n    - ./a.sh\n";
        let out = fx.compile(text).unwrap();
        assert_eq!(out.inlined, 0);
        assert_eq!(out.text, text);
    }

    #[test]
    fn outside_root_is_refused_and_left_in_place() {
        let fx = Fixture::new(&[]);
        let text = "job:\n  script:\n    - ../../etc/evil.sh\n";
        let out = fx.compile(text).unwrap();
        assert_eq!(out.inlined, 0);
        assert_eq!(out.refused, vec!["../../etc/evil.sh".to_string()]);
        assert_eq!(out.text, text);
    }

    #[test]
    fn allow_outside_root_reads_from_disk() {
        let outer = tempfile::tempdir().unwrap();
        std::fs::write(outer.path().join("shared.sh"), "#!/bin/sh\necho shared\n").unwrap();
        let fx = Fixture::new(&[]);
        let text = format!(
            "job:\n  script:\n    - bash {}/shared.sh  # Pragma: allow-outside-root\n",
            outer.path().display()
        );
        let out = fx.compile(&text).unwrap();
        assert_eq!(out.inlined, 1);
        assert!(out.refused.is_empty());
        assert!(out.text.contains("\n    echo shared\n"));
    }

    #[test]
    fn interpreter_programs_follow_the_outside_root_pragma() {
        let outer = tempfile::tempdir().unwrap();
        std::fs::write(outer.path().join("report.py"), "print(1)\n").unwrap();
        let fx = Fixture::new(&[]);
        let command = format!("python {}/report.py", outer.path().display());

        let refused_text = format!("job:\n  script:\n    - {command}\n");
        let out = fx.compile(&refused_text).unwrap();
        assert_eq!(out.inlined, 0);
        assert_eq!(out.refused, vec![command.clone()]);
        assert_eq!(out.text, refused_text);

        let allowed_text =
            format!("job:\n  script:\n    - {command}  # Pragma: allow-outside-root\n");
        let out = fx.compile(&allowed_text).unwrap();
        assert_eq!(out.inlined, 1);
        assert!(out.refused.is_empty());
        assert!(out.text.contains("\n    python -c 'print(1)'\n"));
    }

    #[test]
    fn missing_and_empty_scripts_fail_the_document() {
        let fx = Fixture::new(&[("empty.sh", "#!/bin/bash\n")]);
        let err = fx.compile("job:\n  script: ./missing.sh\n").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Script {
                source: ScriptError::MissingScript { .. },
                ..
            }
        ));
        let err = fx.compile("job:\n  script: ./empty.sh\n").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Script {
                source: ScriptError::EmptyScript { .. },
                ..
            }
        ));
    }

    #[test]
    fn variable_precedence() {
        let mut fx = Fixture::new(&[("build_variables.sh", "B=j\nexport C=j\n")]);
        fx.globals = [("A", "g"), ("B", "g")].into_iter().collect();
        let out = fx
            .compile("build:\n  variables:\n    C: \"y\"\n  script:\n    - echo hi\n")
            .unwrap();

        let value: serde_yaml::Value = serde_yaml::from_str(&out.text).unwrap();
        let globals = &value["variables"];
        let job = &value["build"]["variables"];
        assert_eq!(globals["A"].as_str(), Some("g"));
        assert_eq!(globals["B"].as_str(), Some("g"));
        assert_eq!(job["B"].as_str(), Some("j"));
        assert_eq!(job["C"].as_str(), Some("y"));
        assert!(out.text.starts_with("variables:\n"));
        assert_eq!(out.inlined, 2);
    }

    #[test]
    fn job_variables_section_is_created() {
        let fx = Fixture::new(&[("lint_variables.sh", "LEVEL=strict\n")]);
        let out = fx.compile("lint:\n  stage: test\n  script: make lint\n").unwrap();
        assert_eq!(
            out.text,
            "lint:\n  stage: test\n  variables:\n    LEVEL: strict\n  script: make lint\n"
        );
    }

    #[test]
    fn dotted_reference_lists_become_reference_nodes() {
        let fx = Fixture::new(&[("a.sh", "echo a")]);
        let text = "job:\n  script:\n    - |\n      .setup.script\n      .common.before_script\n    - ./a.sh\n";
        let out = fx.compile(text).unwrap();
        assert!(out.text.contains("    - !reference [.setup, script]\n    - !reference [.common, before_script]\n"));
    }

    #[test]
    fn dotted_job_names_split_at_last_dot() {
        let fx = Fixture::new(&[]);
        let text = "job:\n  script:\n    - |\n      .base.setup.script\n      .other.after_script\n";
        let out = fx.compile(text).unwrap();
        assert_eq!(
            out.text,
            "job:\n  script:\n    - !reference [.base.setup, script]\n    - !reference [.other, after_script]\n"
        );
        assert_eq!(
            reference_list(".base.setup.script\n.other.after_script"),
            Some(vec![
                ScriptNode::Reference { job: ".base.setup".into(), field: "script".into() },
                ScriptNode::Reference { job: ".other".into(), field: "after_script".into() },
            ])
        );
    }

    #[test]
    fn artifact_pragma_is_replaced() {
        let fx = Fixture::new(&[("configs/a.json", "{}"), ("configs/b.json", "[]")]);
        let text = "job:\n  script:\n    - \"# Pragma: inline-artifact ./configs\"\n    - ls -la ./configs\n";
        let out = fx.compile(text).unwrap();
        assert_eq!(out.inlined, 1);
        assert!(!out.text.contains("Pragma: inline-artifact"));
        assert!(out.text.contains("mkdir -p ./configs"));
        assert!(out.text.contains("__WEAVE_ARTIFACT='"));
        assert!(out.text.contains("unzip -q -o"));
        assert!(out.text.contains("ls -la ./configs"));
    }

    #[test]
    fn compiling_output_again_is_a_no_op() {
        let fx = Fixture::new(&[("build.sh", "echo one\necho two")]);
        let first = fx.compile("stages: [build]\nbuild:\n  script: ./build.sh\n").unwrap();
        let second = fx.compile(&first.text).unwrap();
        assert_eq!(second.inlined, 0);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn priority_keys_are_hoisted() {
        let fx = Fixture::new(&[]);
        let out = fx
            .compile("build:\n  script: echo\nstages:\n  - build\ninclude: other.yml\n")
            .unwrap();
        assert_eq!(
            out.text,
            "include: other.yml\nstages:\n  - build\nbuild:\n  script: echo\n"
        );
    }
}
