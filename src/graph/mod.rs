//! Immutable pipeline graphs and their fluent builder.
//!
//! A [`Graph`] is a directed acyclic graph of node ids built once through
//! [`GraphBuilder`] and read-only afterwards: the engine looks up nodes,
//! successors, and predecessors but never mutates topology. All structural
//! invariants (non-empty, unique ids, known edge endpoints, a single entry,
//! no cycles) are enforced at build time so the engine can assume a valid
//! DAG during traversal.
//!
//! # Quick Start
//!
//! ```
//! use warpline::graph::GraphBuilder;
//! # use async_trait::async_trait;
//! # use warpline::envelope::Envelope;
//! # use warpline::node::{Node, NodeContext, NodeError};
//! # use warpline::types::NodeKind;
//! # struct Probe(&'static str);
//! # #[async_trait]
//! # impl Node for Probe {
//! #     fn id(&self) -> &str { self.0 }
//! #     fn kind(&self) -> NodeKind { NodeKind::Transform }
//! #     async fn run(&self, _: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
//! #         Ok(envelope)
//! #     }
//! # }
//!
//! let graph = GraphBuilder::new()
//!     .add_node(Probe("fetch"))
//!     .add_node(Probe("summarize"))
//!     .add_edge("fetch", "summarize")
//!     .with_entry("fetch")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.entry(), "fetch");
//! assert_eq!(graph.successors("fetch"), ["summarize"]);
//! ```

mod builder;

pub use builder::GraphBuilder;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::node::Node;

/// An immutable-after-build directed graph of executable nodes.
///
/// Owned by the caller; the engine borrows it read-only for the duration of
/// a run. Cloning is cheap (nodes are shared behind `Arc`).
#[derive(Clone)]
pub struct Graph {
    nodes: FxHashMap<String, Arc<dyn Node>>,
    successors: FxHashMap<String, Vec<String>>,
    predecessors: FxHashMap<String, Vec<String>>,
    entry: String,
    edge_count: usize,
}

impl Graph {
    pub(crate) fn from_parts(
        nodes: FxHashMap<String, Arc<dyn Node>>,
        successors: FxHashMap<String, Vec<String>>,
        predecessors: FxHashMap<String, Vec<String>>,
        entry: String,
        edge_count: usize,
    ) -> Self {
        Self {
            nodes,
            successors,
            predecessors,
            entry,
            edge_count,
        }
    }

    /// Id of the entry node.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    /// Returns `true` if a node with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Successor ids of a node, in edge-declaration order.
    #[must_use]
    pub fn successors(&self, id: &str) -> &[String] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Predecessor ids of a node, in edge-declaration order.
    ///
    /// For merge nodes this order is the branch-declaration order their
    /// collected inputs are presented in.
    #[must_use]
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterator over all node ids (arbitrary order).
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edge_count)
            .finish()
    }
}

/// Structural errors rejected when building a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// The graph has no nodes.
    #[error("graph is empty")]
    #[diagnostic(
        code(warpline::graph::empty),
        help("Add at least one node before building.")
    )]
    Empty,

    /// The same node id was added twice.
    #[error("node added twice: {id}")]
    #[diagnostic(
        code(warpline::graph::duplicate_node),
        help("Node ids must be unique within a graph.")
    )]
    DuplicateNode { id: String },

    /// An edge references a node that was never added.
    #[error("edge {from} -> {to} references unknown node: {missing}")]
    #[diagnostic(code(warpline::graph::unknown_edge_endpoint))]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    /// No entry node was set and none could be inferred.
    #[error("no entry node: set one explicitly or leave exactly one node without incoming edges")]
    #[diagnostic(
        code(warpline::graph::missing_entry),
        help("Call with_entry(..) on the builder.")
    )]
    MissingEntry,

    /// The entry node was set more than once.
    #[error("entry node set twice: {first} then {second}")]
    #[diagnostic(code(warpline::graph::entry_set_twice))]
    EntrySetTwice { first: String, second: String },

    /// The configured entry id does not exist.
    #[error("entry node not found: {id}")]
    #[diagnostic(code(warpline::graph::unknown_entry))]
    UnknownEntry { id: String },

    /// The graph contains a cycle.
    #[error("cycle detected: {}", path.join(" -> "))]
    #[diagnostic(
        code(warpline::graph::cycle),
        help("Pipeline graphs must be acyclic; loops belong inside nodes.")
    )]
    Cycle { path: Vec<String> },
}
