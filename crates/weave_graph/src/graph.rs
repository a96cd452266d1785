//! The graph itself and its DOT rendering.

use std::collections::BTreeMap;
use std::fmt::Write;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    /// A pipeline document.
    Document,
    /// A shell script.
    Script,
}

/// A file in the graph, named by its root-relative slash path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Root-relative path with `/` separators.
    pub id: String,
    /// Document or script.
    pub kind: NodeKind,
}

/// Directed "references" graph over documents and scripts.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, ()>,
    index: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node if `id` is new and returns its index.
    pub fn add_node(&mut self, id: &str, kind: NodeKind) -> NodeIndex {
        if let Some(&ix) = self.index.get(id) {
            return ix;
        }
        let ix = self.graph.add_node(GraphNode {
            id: id.to_string(),
            kind,
        });
        self.index.insert(id.to_string(), ix);
        ix
    }

    /// Adds an edge `from -> to`, creating nodes as needed. Repeated edges
    /// are stored once.
    pub fn add_edge(&mut self, from: &str, from_kind: NodeKind, to: &str) {
        let a = self.add_node(from, from_kind);
        let b = self.add_node(to, NodeKind::Script);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes sorted by id.
    pub fn nodes(&self) -> Vec<&GraphNode> {
        self.index.values().map(|&ix| &self.graph[ix]).collect()
    }

    /// Every edge as `(from, to)` ids, sorted.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].id.as_str(),
                    self.graph[e.target()].id.as_str(),
                )
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Direct dependencies of `id`, sorted.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<&str> = self
            .graph
            .neighbors(ix)
            .map(|n| self.graph[n].id.as_str())
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Groups of scripts that source each other in a loop, each sorted.
    pub fn cycles(&self) -> Vec<Vec<&str>> {
        let mut cycles: Vec<Vec<&str>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some())
            .map(|scc| {
                let mut ids: Vec<&str> = scc.iter().map(|&ix| self.graph[ix].id.as_str()).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Renders the graph in Graphviz DOT, documents and scripts in separate
    /// clusters. Output is sorted and therefore stable.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph weave {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, fontname=\"Helvetica\"];\n");

        for (kind, name, label, color) in [
            (NodeKind::Document, "cluster_documents", "Pipeline documents", "lightblue"),
            (NodeKind::Script, "cluster_scripts", "Scripts", "lightgrey"),
        ] {
            let _ = writeln!(out, "\n    subgraph {name} {{");
            let _ = writeln!(out, "        label=\"{label}\";");
            out.push_str("        style=filled;\n");
            let _ = writeln!(out, "        color={color};");
            for node in self.nodes().into_iter().filter(|n| n.kind == kind) {
                let id = quote(&node.id);
                let _ = writeln!(out, "        {id} [label={id}];");
            }
            out.push_str("    }\n");
        }

        out.push('\n');
        for (from, to) in self.edges() {
            let _ = writeln!(out, "    {} -> {};", quote(from), quote(to));
        }
        out.push_str("}\n");
        out
    }
}

fn quote(id: &str) -> String {
    format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\""))
}
