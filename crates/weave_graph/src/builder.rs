//! Walking a source tree into a [`DependencyGraph`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, error, info, warn};
use weave_common::{is_within, normalize_lexically, relative_slash};
use weave_script::{parse_reference, strip_preamble, InvocationHint};
use weave_source::discover_documents;
use weave_yaml::SCRIPT_KEYS;

use crate::error::GraphError;
use crate::graph::{DependencyGraph, NodeKind};

/// Builds the graph for every document under `root`.
///
/// Document references resolve against the document's directory and
/// `source` lines against the sourcing script's directory. References
/// leaving `root` are refused. A missing script keeps its edge but is not
/// followed further.
pub fn build_graph(root: &Path) -> Result<DependencyGraph, GraphError> {
    if !root.is_dir() {
        return Err(GraphError::InputNotFound {
            path: root.to_path_buf(),
        });
    }
    info!(root = %root.display(), "Starting dependency graph generation");

    let mut walker = Walker {
        root,
        graph: DependencyGraph::new(),
        visited: BTreeSet::new(),
        pending: Vec::new(),
    };
    for document in discover_documents(root)? {
        walker.scan_document(&document);
    }
    while let Some(script) = walker.pending.pop() {
        walker.scan_script(&script);
    }

    debug!(nodes = walker.graph.node_count(), "dependency graph built");
    Ok(walker.graph)
}

/// Builds the graph and renders it as DOT. A tree without documents gives
/// an empty string.
pub fn generate_dependency_graph(root: &Path) -> Result<String, GraphError> {
    let graph = build_graph(root)?;
    if !graph.nodes().iter().any(|n| n.kind == NodeKind::Document) {
        warn!(root = %root.display(), "no pipeline documents found");
        return Ok(String::new());
    }
    for cycle in graph.cycles() {
        warn!(scripts = %cycle.join(" -> "), "scripts source each other in a loop");
    }
    Ok(graph.to_dot())
}

struct Walker<'a> {
    root: &'a Path,
    graph: DependencyGraph,
    visited: BTreeSet<PathBuf>,
    pending: Vec<PathBuf>,
}

impl Walker<'_> {
    fn id_of(&self, path: &Path) -> Option<String> {
        relative_slash(path, self.root)
    }

    fn scan_document(&mut self, path: &Path) {
        let Some(id) = self.id_of(path) else {
            return;
        };
        self.graph.add_node(&id, NodeKind::Document);

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read document");
                return;
            }
        };
        let mut values = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&text) {
            match Value::deserialize(document) {
                Ok(value) => values.push(value),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse YAML file");
                    return;
                }
            }
        }

        let mut commands = Vec::new();
        for value in &values {
            collect_commands(value, false, &mut commands);
        }
        let dir = path.parent().unwrap_or(self.root);
        for command in commands {
            if let Some(reference) = parse_reference(command) {
                self.link(&id, NodeKind::Document, dir, &reference.path);
            }
        }
    }

    fn scan_script(&mut self, path: &Path) {
        let Some(id) = self.id_of(path) else {
            return;
        };
        let content = match std::fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!(path = %path.display(), "script is not valid UTF-8; not following its sources");
                    return;
                }
            },
            Err(_) => {
                warn!(path = %path.display(), "Dependency not found and will be skipped");
                return;
            }
        };
        let dir = path.parent().unwrap_or(self.root);
        for line in strip_preamble(&content).lines() {
            let Some(reference) = parse_reference(line) else {
                continue;
            };
            if reference.hint == InvocationHint::DotSource {
                self.link(&id, NodeKind::Script, dir, &reference.path);
            }
        }
    }

    /// Adds `from -> target` if the target stays inside the root, and queues
    /// the target for scanning the first time it is seen.
    fn link(&mut self, from: &str, kind: NodeKind, base: &Path, target: &str) {
        let resolved = normalize_lexically(&base.join(target));
        if !is_within(&resolved, self.root) {
            error!(
                from,
                reference = target,
                root = %self.root.display(),
                "Refusing to trace source outside the root"
            );
            return;
        }
        let Some(to) = self.id_of(&resolved) else {
            return;
        };
        self.graph.add_edge(from, kind, &to);
        if self.visited.insert(resolved.clone()) {
            self.pending.push(resolved);
        }
    }
}

/// Collects every string under a script-bearing key, at any depth.
fn collect_commands<'v>(value: &'v Value, in_script: bool, out: &mut Vec<&'v str>) {
    match value {
        Value::String(s) if in_script => out.push(s),
        Value::Sequence(items) => {
            for item in items {
                collect_commands(item, in_script, out);
            }
        }
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_script = key.as_str().is_some_and(|k| SCRIPT_KEYS.contains(&k));
                collect_commands(child, in_script || is_script, out);
            }
        }
        Value::Tagged(tagged) => collect_commands(&tagged.value, in_script, out),
        _ => {}
    }
}
