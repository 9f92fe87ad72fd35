//! Step-through debugging protocol.
//!
//! At defined pause points (`before_node` / `after_node`) the engine can hand
//! control to a [`StepController`]: it builds a [`StepRequest`] describing
//! the paused position, waits synchronously for a [`StepResponse`], and acts
//! on the returned [`StepAction`]. Four controller variants ship with the
//! crate, all speaking the same contract:
//!
//! - [`CallbackStepController`]: invokes a user closure inline.
//! - [`ChannelStepController`]: decouples the engine from an external
//!   debugger through bounded request/response queues, with named
//!   breakpoints and `run_to_breakpoint` suppression.
//! - [`BreakpointStepController`]: pauses only at an explicit
//!   `(node id, point)` set.
//! - [`AutoStepController`]: never blocks on external input; applies a
//!   per-step delay and a pause/resume toggle for slow-motion observation.
//!
//! Every pause and resolution is mirrored into the run's event stream as
//! `step.paused` / `step.resumed` / `step.skipped` / `step.aborted`.

mod autostep;
mod breakpoint;
mod callback;
mod channel;

pub use autostep::AutoStepController;
pub use breakpoint::BreakpointStepController;
pub use callback::CallbackStepController;
pub use channel::{ChannelStepController, StepChannelHandle, auto_continue};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::types::NodeKind;
use crate::utils::id_generator::IdGenerator;

/// Defined moments at which execution may pause for external inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPoint {
    /// Before the node's run operation executes.
    BeforeNode,
    /// After the node's run operation finished (or failed).
    AfterNode,
}

impl StepPoint {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StepPoint::BeforeNode => "before_node",
            StepPoint::AfterNode => "after_node",
        }
    }
}

impl std::fmt::Display for StepPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the controller wants the engine to do at a pause point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Proceed normally, optionally applying the response's envelope patch.
    Continue,
    /// Bypass the node's run operation entirely and proceed as a no-op.
    Skip,
    /// Raise a distinguished "execution aborted" failure immediately.
    Abort,
    /// Controller-local hint: stop pausing until the next breakpoint.
    ///
    /// The engine treats this like [`StepAction::Continue`]; suppression
    /// logic is owned by controllers that support it (the channel variant).
    RunToBreakpoint,
}

/// Variable mutation applied to the envelope on `continue`, valid only at
/// the `before_node` point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePatch {
    /// Variables to set or overwrite.
    pub set_vars: FxHashMap<String, Value>,
    /// Variables to remove.
    pub delete_vars: Vec<String>,
}

impl EnvelopePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set_vars.is_empty() && self.delete_vars.is_empty()
    }

    /// Apply the patch to an envelope: deletions first, then sets.
    pub fn apply(&self, envelope: &mut Envelope) {
        for key in &self.delete_vars {
            envelope.delete_var(key);
        }
        for (key, value) in &self.set_vars {
            envelope.set_var(key.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set_vars.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.delete_vars.push(key.into());
        self
    }
}

/// Read-only snapshot of the paused node's neighborhood.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphContext {
    /// Predecessor node ids, in edge-declaration order.
    pub predecessors: Vec<String>,
    /// Successor node ids, in edge-declaration order.
    pub successors: Vec<String>,
}

/// A pause handed to the controller.
///
/// Requests are created synchronously at the pause point and destroyed once
/// a matching response arrives or the run's context is cancelled. The
/// embedded envelope is a read-only snapshot; mutations travel back through
/// the response's [`EnvelopePatch`].
#[derive(Clone, Debug)]
pub struct StepRequest {
    /// Unique id of this request.
    pub id: String,
    /// Run the pause belongs to.
    pub run_id: String,
    /// Which pause point fired.
    pub point: StepPoint,
    /// Id of the node execution paused at.
    pub node_id: String,
    /// Kind of that node.
    pub node_kind: NodeKind,
    /// Snapshot of the envelope at the pause point.
    pub envelope: Envelope,
    /// Hop count at the pause point.
    pub hop: u32,
    /// The node's error, when pausing after a failed node.
    pub error: Option<String>,
    /// Neighborhood snapshot of the paused node.
    pub graph: GraphContext,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl StepRequest {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        point: StepPoint,
        node_id: impl Into<String>,
        node_kind: NodeKind,
        envelope: Envelope,
        graph: GraphContext,
    ) -> Self {
        Self {
            id: IdGenerator::new().generate_request_id(),
            run_id: run_id.into(),
            point,
            node_id: node_id.into(),
            node_kind,
            hop: envelope.trace.hops,
            envelope,
            error: None,
            graph,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// The controller's answer to a [`StepRequest`].
#[derive(Clone, Debug, PartialEq)]
pub struct StepResponse {
    /// Id of the request this answers.
    pub request_id: String,
    /// Action to take.
    pub action: StepAction,
    /// Optional envelope mutation, honored on `continue` at `before_node`.
    pub patch: Option<EnvelopePatch>,
    /// Optional controller-defined metadata.
    pub metadata: Option<Value>,
}

impl StepResponse {
    #[must_use]
    pub fn proceed(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            action: StepAction::Continue,
            patch: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn skip(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            action: StepAction::Skip,
            patch: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn abort(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            action: StepAction::Abort,
            patch: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn run_to_breakpoint(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            action: StepAction::RunToBreakpoint,
            patch: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_patch(mut self, patch: EnvelopePatch) -> Self {
        self.patch = Some(patch);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The debugging-protocol contract: given a pause request, return an action.
///
/// Controllers that maintain internal state (pending responses, breakpoint
/// sets) must protect it themselves; multiple branches may pause
/// concurrently.
#[async_trait]
pub trait StepController: Send + Sync {
    /// Handle one pause. Blocking here suspends the paused branch until the
    /// response arrives or the run is cancelled / times out.
    async fn step(&self, request: StepRequest) -> Result<StepResponse, StepError>;

    /// Whether the engine should pause at this node and point at all.
    /// Defaults to pausing everywhere.
    fn should_pause(&self, _node_id: &str, _point: StepPoint) -> bool {
        true
    }
}

/// Failures of the step protocol itself.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// The controller's transport is gone (queue closed, consumer dropped).
    #[error("step controller disconnected")]
    #[diagnostic(
        code(warpline::step::disconnected),
        help("The debugger side dropped its queue handles.")
    )]
    Disconnected,

    /// The controller failed internally.
    #[error("step controller failed: {0}")]
    #[diagnostic(code(warpline::step::controller))]
    Controller(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_applies_deletes_before_sets() {
        let mut envelope = Envelope::default();
        envelope.set_var("stale", json!(1));

        let patch = EnvelopePatch::default()
            .delete("stale")
            .set("fresh", json!("yes"));
        patch.apply(&mut envelope);

        assert!(envelope.var("stale").is_none());
        assert_eq!(envelope.var("fresh"), Some(&json!("yes")));
    }

    #[test]
    fn request_captures_hop_from_envelope() {
        let mut envelope = Envelope::default();
        envelope.trace.hops = 7;
        let request = StepRequest::new(
            "run-1",
            StepPoint::BeforeNode,
            "n",
            NodeKind::Transform,
            envelope,
            GraphContext::default(),
        );
        assert_eq!(request.hop, 7);
        assert!(request.id.starts_with("step-"));
    }
}
