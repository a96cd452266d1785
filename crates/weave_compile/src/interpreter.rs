//! Embedding non-shell interpreter programs as one-liners.
//!
//! `python tools/report.py` becomes `python -c '<program text>'`, wrapped in
//! inline markers. Each interpreter in the registry knows which extensions
//! it runs and how it takes program text on the command line.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use weave_common::{is_within, normalize_lexically};
use weave_script::{split_words, strip_preamble, INLINE_BEGIN, INLINE_END};

use crate::shell::single_quote;

struct Interpreter {
    names: &'static [&'static str],
    extensions: &'static [&'static str],
    /// Flag that takes the program text; `None` when the text is the first
    /// argument.
    code_flag: Option<&'static str>,
    runs_modules: bool,
}

const REGISTRY: &[Interpreter] = &[
    Interpreter {
        names: &["python", "python3"],
        extensions: &["py"],
        code_flag: Some("-c"),
        runs_modules: true,
    },
    Interpreter {
        names: &["node"],
        extensions: &["js", "mjs", "cjs"],
        code_flag: Some("-e"),
        runs_modules: false,
    },
    Interpreter {
        names: &["ruby"],
        extensions: &["rb"],
        code_flag: Some("-e"),
        runs_modules: false,
    },
    Interpreter {
        names: &["perl"],
        extensions: &["pl"],
        code_flag: Some("-e"),
        runs_modules: false,
    },
    Interpreter {
        names: &["php"],
        extensions: &["php"],
        code_flag: Some("-r"),
        runs_modules: false,
    },
    Interpreter {
        names: &["lua"],
        extensions: &["lua"],
        code_flag: Some("-e"),
        runs_modules: false,
    },
    Interpreter {
        names: &["awk", "gawk"],
        extensions: &["awk"],
        code_flag: None,
        runs_modules: false,
    },
];

/// Shim lines produced for one interpreter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterShim {
    /// Script lines replacing the invocation.
    pub lines: Vec<String>,
    /// The embedded program file.
    pub source: PathBuf,
}

/// What the packager made of one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterOffer {
    /// The program was embedded.
    Inlined(InterpreterShim),
    /// The program lives outside the scripts root and the line carries no
    /// `allow-outside-root` pragma.
    Refused(PathBuf),
    /// Not an interpreter invocation this packager can embed.
    Declined,
}

impl InterpreterOffer {
    /// The shim, when the program was embedded.
    pub fn shim(self) -> Option<InterpreterShim> {
        match self {
            InterpreterOffer::Inlined(shim) => Some(shim),
            _ => None,
        }
    }
}

/// Inlines `<interpreter> <file>` lines whose file lives under the scripts
/// root, or anywhere when the line allows it.
#[derive(Debug, Clone)]
pub struct InterpreterPackager {
    scripts_root: PathBuf,
    max_inline_len: usize,
}

impl InterpreterPackager {
    /// Creates a packager that refuses commands longer than `max_inline_len`.
    pub fn new(scripts_root: impl Into<PathBuf>, max_inline_len: usize) -> Self {
        Self {
            scripts_root: scripts_root.into(),
            max_inline_len,
        }
    }

    /// Offers `line` to the packager. Programs outside the scripts root are
    /// refused unless `allow_outside_root` is set.
    pub fn try_inline(&self, line: &str, allow_outside_root: bool) -> InterpreterOffer {
        match self.embed(line, allow_outside_root) {
            Ok(Some(shim)) => InterpreterOffer::Inlined(shim),
            Ok(None) => InterpreterOffer::Declined,
            Err(path) => InterpreterOffer::Refused(path),
        }
    }

    /// `Err` carries the program path when it escapes the root.
    fn embed(
        &self,
        line: &str,
        allow_outside_root: bool,
    ) -> Result<Option<InterpreterShim>, PathBuf> {
        let Some(words) = split_words(line.trim()) else {
            return Ok(None);
        };
        let (name, target) = match words.as_slice() {
            [name, path] if !path.starts_with('-') => (name, Target::File(path)),
            [name, flag, module] if flag == "-m" => (name, Target::Module(module)),
            _ => return Ok(None),
        };
        let Some(interp) = REGISTRY.iter().find(|i| i.names.contains(&name.as_str())) else {
            return Ok(None);
        };

        let rel = match target {
            Target::File(path) => {
                let ext = Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_ascii_lowercase);
                if !ext.is_some_and(|e| interp.extensions.contains(&e.as_str())) {
                    debug!(line, "file extension does not match interpreter");
                    return Ok(None);
                }
                PathBuf::from(path)
            }
            Target::Module(module) if interp.runs_modules => match self.resolve_module(module) {
                Some(rel) => rel,
                None => return Ok(None),
            },
            Target::Module(_) => return Ok(None),
        };

        let source = if rel.is_absolute() {
            normalize_lexically(&rel)
        } else {
            normalize_lexically(&self.scripts_root.join(&rel))
        };
        if !allow_outside_root && (rel.is_absolute() || !is_within(&source, &self.scripts_root)) {
            return Err(source);
        }
        let content = match std::fs::read_to_string(&source) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %source.display(), error = %e, "interpreter script not readable");
                return Ok(None);
            }
        };

        let mut code = strip_preamble(&content).trim_end();
        if name == "php" {
            code = code.trim_start();
            code = code.strip_prefix("<?php").unwrap_or(code);
            code = code.strip_suffix("?>").unwrap_or(code).trim();
        }
        let command = match interp.code_flag {
            Some(flag) => format!("{name} {flag} {}", single_quote(code)),
            None => format!("{name} {}", single_quote(code)),
        };
        if command.len() > self.max_inline_len {
            warn!(
                path = %source.display(),
                len = command.len(),
                max = self.max_inline_len,
                "Interpreter script is too long to inline; leaving the line in place"
            );
            return Ok(None);
        }

        Ok(Some(InterpreterShim {
            lines: vec![
                format!("{INLINE_BEGIN} {}", line.trim()),
                command,
                INLINE_END.to_string(),
            ],
            source,
        }))
    }

    /// `pkg.mod` resolves to `pkg/mod.py`, falling back to `pkg/mod/__main__.py`.
    fn resolve_module(&self, module: &str) -> Option<PathBuf> {
        if module.is_empty() || !module.split('.').all(|p| !p.is_empty()) {
            return None;
        }
        let base: PathBuf = module.split('.').collect();
        let file = base.with_extension("py");
        if self.scripts_root.join(&file).is_file() {
            return Some(file);
        }
        let main = base.join("__main__.py");
        self.scripts_root.join(&main).is_file().then_some(main)
    }
}

enum Target<'a> {
    File(&'a str),
    Module(&'a str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn python_file() {
        let dir = root(&[("tools/hello.py", "#!/usr/bin/env python3\nprint('hi')\n")]);
        let shim = InterpreterPackager::new(dir.path(), 10_000)
            .try_inline("python3 tools/hello.py", false)
            .shim()
            .unwrap();
        assert_eq!(
            shim.lines,
            vec![
                "# >>> BEGIN inline: python3 tools/hello.py".to_string(),
                "python3 -c 'print('\"'\"'hi'\"'\"')'".to_string(),
                "# <<< END inline".to_string(),
            ]
        );
    }

    #[test]
    fn python_module() {
        let dir = root(&[("pkg/tool/__main__.py", "print(1)")]);
        let shim = InterpreterPackager::new(dir.path(), 10_000)
            .try_inline("python -m pkg.tool", false)
            .shim()
            .unwrap();
        assert_eq!(shim.lines[1], "python -c 'print(1)'");
        assert!(shim.source.ends_with("pkg/tool/__main__.py"));
    }

    #[test]
    fn php_tags_and_awk_program_argument() {
        let dir = root(&[("a.php", "<?php\necho 1;\n?>\n"), ("b.awk", "{ print $1 }")]);
        let p = InterpreterPackager::new(dir.path(), 10_000);
        assert_eq!(p.try_inline("php a.php", false).shim().unwrap().lines[1], "php -r 'echo 1;'");
        assert_eq!(p.try_inline("awk b.awk", false).shim().unwrap().lines[1], "awk '{ print $1 }'");
    }

    #[test]
    fn refusals() {
        let dir = root(&[("run.js", "console.log(1)"), ("big.rb", &"x".repeat(200))]);
        let p = InterpreterPackager::new(dir.path(), 100);
        assert_eq!(p.try_inline("node missing.js", false), InterpreterOffer::Declined);
        assert_eq!(p.try_inline("node run.py", false), InterpreterOffer::Declined);
        assert_eq!(p.try_inline("node run.js --flag", false), InterpreterOffer::Declined);
        assert!(matches!(p.try_inline("node ../run.js", false), InterpreterOffer::Refused(_)));
        assert_eq!(p.try_inline("ruby big.rb", false), InterpreterOffer::Declined);
        assert_eq!(p.try_inline("bash run.sh", false), InterpreterOffer::Declined);
        assert!(p.try_inline("node run.js", false).shim().is_some());
    }

    #[test]
    fn outside_root_needs_allowance() {
        let outer = root(&[("shared/report.py", "print('report')\n")]);
        let inner = outer.path().join("ci");
        std::fs::create_dir_all(&inner).unwrap();
        let p = InterpreterPackager::new(&inner, 10_000);

        match p.try_inline("python ../shared/report.py", false) {
            InterpreterOffer::Refused(path) => assert!(path.ends_with("shared/report.py")),
            other => panic!("expected refusal, got {other:?}"),
        }
        let shim = p.try_inline("python ../shared/report.py", true).shim().unwrap();
        assert_eq!(shim.lines[1], "python -c 'print('\"'\"'report'\"'\"')'");
    }
}
