//! Node execution contracts for the warpline engine.
//!
//! This module defines the capability every executable unit implements
//! ([`Node`]), the fan-in extension ([`MergeCapable`]), the context handed to
//! a node while it runs ([`NodeContext`]), and the error types surrounding
//! node execution.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::event_bus::{Event, EventEmitter, EventKind};
use crate::types::NodeKind;

/// Core capability of an executable unit in a pipeline graph.
///
/// A node receives the envelope, performs its work, and returns the
/// (possibly mutated) envelope. The engine never interprets what a node does;
/// it only invokes `run`, applies the node's [`ErrorPolicy`] on failure, and
/// wires events and step points around the call.
///
/// Retry behavior is internal to the node: implementations that talk to
/// flaky backends retry inside `run` and only return `Err` once their
/// attempts are exhausted.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use warpline::envelope::Envelope;
/// use warpline::node::{Node, NodeContext, NodeError};
/// use warpline::types::NodeKind;
/// use serde_json::json;
///
/// struct Stamp {
///     id: String,
/// }
///
/// #[async_trait]
/// impl Node for Stamp {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn kind(&self) -> NodeKind {
///         NodeKind::Transform
///     }
///
///     async fn run(&self, ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
///         ctx.emit("stamping envelope")?;
///         envelope.set_var(&self.id, json!(true));
///         Ok(envelope)
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    /// Identifier of this node, unique within a graph.
    fn id(&self) -> &str;

    /// Behavior category tag.
    fn kind(&self) -> NodeKind;

    /// Execute this node against the envelope.
    async fn run(&self, ctx: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError>;

    /// How the engine treats a failure of this node after internal retries
    /// are exhausted. Defaults to aborting the run.
    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Fail
    }

    /// Merge capability discovery.
    ///
    /// Nodes that must wait for multiple parallel inputs return `Some(self)`;
    /// everything else keeps the default.
    fn as_merge(&self) -> Option<&dyn MergeCapable> {
        None
    }
}

/// Fan-in extension: a node that blocks until N parallel inputs arrived and
/// reduces them to one envelope.
#[async_trait]
pub trait MergeCapable: Send + Sync {
    /// Number of envelopes this node expects before merging.
    ///
    /// `None` means "one per incoming edge", resolved against the graph at
    /// run time.
    fn expected_inputs(&self) -> Option<usize> {
        None
    }

    /// Reduce the collected envelopes, given in branch-declaration order,
    /// to a single envelope.
    ///
    /// The engine only calls this with two or more inputs: zero inputs yield
    /// an empty envelope and a single input passes through unchanged.
    async fn merge_inputs(
        &self,
        ctx: NodeContext,
        inputs: Vec<Envelope>,
    ) -> Result<Envelope, NodeError>;
}

/// How the engine handles a node failure after internal retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort the run and surface the error.
    #[default]
    Fail,
    /// Swallow the error and proceed with the pre-failure envelope.
    Continue,
    /// Append a structured failure record to the envelope and proceed.
    Record,
}

/// Execution context handed to a node for the duration of one `run` call.
///
/// Carries identity for event enrichment and a shared emitter so nodes can
/// surface intermediate `node.message` events into the same ordered stream
/// the engine writes to.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Run this invocation belongs to.
    pub run_id: String,
    /// Identifier of the executing node.
    pub node_id: String,
    /// Kind of the executing node.
    pub node_kind: NodeKind,
    /// Hop count at which this node executes.
    pub hop: u32,
    /// Emitter shared with the engine.
    pub event_emitter: Arc<dyn EventEmitter>,
}

impl NodeContext {
    /// Emit a `node.message` event enriched with this context's metadata.
    pub fn emit(&self, message: impl Into<String>) -> Result<(), NodeContextError> {
        self.emit_with_payload(message, FxHashMap::default())
    }

    /// Emit a `node.message` event with an additional payload map.
    pub fn emit_with_payload(
        &self,
        message: impl Into<String>,
        mut payload: FxHashMap<String, Value>,
    ) -> Result<(), NodeContextError> {
        payload.insert("message".to_string(), Value::String(message.into()));
        let mut event = Event::for_node(
            EventKind::NodeMessage,
            self.run_id.clone(),
            self.node_id.clone(),
            self.node_kind.clone(),
        );
        event.payload = payload;
        self.event_emitter
            .emit(event)
            .map_err(|_| NodeContextError::EmitterUnavailable)
    }
}

/// Errors that can occur when using [`NodeContext`] methods.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    /// Event could not be emitted because the emitter is gone.
    #[error("failed to emit event: emitter unavailable")]
    #[diagnostic(
        code(warpline::node::emitter_unavailable),
        help("The run may have ended or the event bus shut down.")
    )]
    EmitterUnavailable,
}

/// Fatal errors returned by node execution.
///
/// A returned `NodeError` means the node's own retries are exhausted; the
/// engine then applies the node's [`ErrorPolicy`]. For recoverable problems
/// a node should record a failure on the envelope and return `Ok`.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the envelope.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(warpline::node::missing_input),
        help("Check that an upstream node produced the required variable.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(warpline::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(warpline::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(warpline::node::validation),
        help("Check input data format and required fields.")
    )]
    ValidationFailed(String),

    /// Event emission failed.
    #[error("event emission error: {0}")]
    #[diagnostic(code(warpline::node::emitter))]
    Emitter(#[from] NodeContextError),

    /// Catch-all failure with a message.
    #[error("{0}")]
    #[diagnostic(code(warpline::node::other))]
    Other(String),
}
