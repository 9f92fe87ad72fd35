//! The engine's error taxonomy.
//!
//! Every fatal failure surfaces as a [`RuntimeError`], wrapped with node id
//! and kind at the propagation boundary so the root cause stays
//! inspectable. Non-fatal node failures (policies `continue` / `record`)
//! never appear here; they are visible on the envelope instead.

use miette::Diagnostic;
use thiserror::Error;
use tokio::task::JoinError;

use crate::node::NodeError;
use crate::step::StepError;
use crate::types::NodeKind;

#[derive(Debug, Error, Diagnostic)]
pub enum RuntimeError {
    /// A node failed with fail-policy after its internal retries.
    #[error("node {id} ({kind}) failed: {source}")]
    #[diagnostic(code(warpline::runtime::node))]
    Node {
        id: String,
        kind: NodeKind,
        #[source]
        source: NodeError,
    },

    /// The merge operation itself failed; always fatal.
    #[error("merge node {id} failed: {source}")]
    #[diagnostic(code(warpline::runtime::merge))]
    Merge {
        id: String,
        #[source]
        source: NodeError,
    },

    /// Runaway-graph guard tripped; always fatal, non-retryable.
    #[error("max hop count {limit} exceeded at node {node_id}")]
    #[diagnostic(
        code(warpline::runtime::max_hops),
        help("Raise max_hops if the pipeline is legitimately deep; otherwise check for unbounded fan-out.")
    )]
    MaxHopsExceeded { limit: u32, node_id: String },

    /// A step controller requested abort; always fatal, non-retryable.
    #[error("execution aborted at node {node_id} by step controller")]
    #[diagnostic(code(warpline::runtime::aborted))]
    Aborted { node_id: String },

    /// The run's cancellation signal fired; propagated verbatim.
    #[error("run cancelled: {reason}")]
    #[diagnostic(code(warpline::runtime::cancelled))]
    Cancelled { reason: String },

    /// The step controller failed or disconnected while awaited.
    #[error("step protocol failed at node {node_id}: {source}")]
    #[diagnostic(code(warpline::runtime::step))]
    Step {
        node_id: String,
        #[source]
        source: StepError,
    },

    /// No controller response arrived within the configured step timeout.
    #[error("step controller timed out at node {node_id}")]
    #[diagnostic(code(warpline::runtime::step_timeout))]
    StepTimeout { node_id: String },

    /// Traversal reached a node id absent from the graph.
    #[error("unknown node in traversal: {id}")]
    #[diagnostic(
        code(warpline::runtime::unknown_node),
        help("Graphs are validated at build time; this indicates the graph was mutated after build.")
    )]
    UnknownNode { id: String },

    /// A merge barrier can never complete, or no branch reached a terminal
    /// node.
    #[error("run stalled at {node_id}: required inputs can never arrive")]
    #[diagnostic(
        code(warpline::runtime::stalled),
        help("A merge node expects more inputs than the graph can deliver.")
    )]
    Stalled { node_id: String },

    /// A spawned branch task panicked or was aborted.
    #[error("branch task join error: {0}")]
    #[diagnostic(code(warpline::runtime::join))]
    Join(#[from] JoinError),
}

impl RuntimeError {
    /// Whether this error is the distinguished cancellation failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RuntimeError::Cancelled { .. })
    }

    /// Whether this error is the distinguished step-abort failure.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, RuntimeError::Aborted { .. })
    }
}
