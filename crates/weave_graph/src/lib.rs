//! Dependency graph of pipeline documents and the scripts they reach.
//!
//! [`build_graph`] walks every document under a root, follows each script
//! reference the safe reference parser accepts, and then follows `source`
//! lines inside those scripts. [`DependencyGraph::to_dot`] renders the
//! result for Graphviz.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod graph;

pub use builder::{build_graph, generate_dependency_graph};
pub use error::GraphError;
pub use graph::{DependencyGraph, GraphNode, NodeKind};
