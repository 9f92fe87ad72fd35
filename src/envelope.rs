//! The envelope: the single data carrier that flows through a pipeline graph.
//!
//! An envelope is created once per run, handed to each node in turn, cloned
//! at every fan-out point, and reconciled at merge nodes. Nodes treat it as
//! append-preferring: variables are added, messages and artifacts are pushed,
//! failures accumulate. The engine clones the envelope before handing it to
//! parallel branches, so no two concurrently running nodes can observe each
//! other's mutations.
//!
//! # Examples
//!
//! ```
//! use warpline::envelope::Envelope;
//! use serde_json::json;
//!
//! let mut envelope = Envelope::builder()
//!     .with_input(json!("summarize the report"))
//!     .with_var("language", json!("en"))
//!     .build();
//!
//! envelope.set_var("tokens", json!(512));
//! assert_eq!(envelope.var("language"), Some(&json!("en")));
//! assert_eq!(envelope.trace.hops, 0);
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FailureRecord;
use crate::message::Message;
use crate::utils::collections::new_vars_map;
use crate::utils::id_generator::IdGenerator;

/// Run, parent, and span identifiers attached to an envelope, plus the run
/// start time and the hop counter the engine uses to bound traversal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Identifier of the run this envelope belongs to.
    pub run_id: String,
    /// Span id of the branch that forked this envelope, if any.
    pub parent_span_id: Option<String>,
    /// Span id of the current branch of execution.
    pub span_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Number of nodes visited so far on this branch.
    pub hops: u32,
}

impl Trace {
    /// Fresh trace for a new run.
    #[must_use]
    pub fn new_run() -> Self {
        let ids = IdGenerator::new();
        Self {
            run_id: ids.generate_run_id(),
            parent_span_id: None,
            span_id: ids.generate_span_id(),
            started_at: Utc::now(),
            hops: 0,
        }
    }

    /// Child trace for a forked branch: same run, new span, parent recorded.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            parent_span_id: Some(self.span_id.clone()),
            span_id: IdGenerator::new().generate_span_id(),
            started_at: self.started_at,
            hops: self.hops,
        }
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new_run()
    }
}

/// A structured output produced by a node, kept in production order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Name of the artifact, unique only by convention.
    pub name: String,
    /// Category tag ("summary", "citation", "image_ref", ...).
    pub kind: String,
    /// Artifact payload.
    pub content: Value,
    /// Id of the node that produced it.
    pub produced_by: String,
    /// Production timestamp.
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        content: Value,
        produced_by: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            content,
            produced_by: produced_by.into(),
            created_at: Utc::now(),
        }
    }
}

/// The mutable data carrier passed between nodes.
///
/// Fields are public: nodes read and mutate the envelope directly during
/// their `run` operation and return it to the engine. Variable keys are
/// unique; insertion order of the bag is irrelevant. Artifacts, messages,
/// and errors are ordered sequences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Arbitrary run input payload.
    pub input: Value,
    /// Named variable bag with engine-opaque JSON values.
    pub vars: FxHashMap<String, Value>,
    /// Structured outputs in production order.
    pub artifacts: Vec<Artifact>,
    /// Chat-style records in arrival order.
    pub messages: Vec<Message>,
    /// Accumulated failures in arrival order.
    pub errors: Vec<FailureRecord>,
    /// Run/branch identifiers and hop counter.
    pub trace: Trace,
}

impl Envelope {
    /// Envelope for a new run with the given input payload.
    #[must_use]
    pub fn new(input: Value) -> Self {
        Self {
            input,
            vars: new_vars_map(),
            artifacts: Vec::new(),
            messages: Vec::new(),
            errors: Vec::new(),
            trace: Trace::new_run(),
        }
    }

    /// Empty envelope sharing an existing trace.
    ///
    /// Used by the engine for merge nodes that collected zero inputs.
    #[must_use]
    pub fn empty_with_trace(trace: Trace) -> Self {
        Self {
            input: Value::Null,
            vars: new_vars_map(),
            artifacts: Vec::new(),
            messages: Vec::new(),
            errors: Vec::new(),
            trace,
        }
    }

    /// Builder for envelopes with pre-seeded vars and messages.
    #[must_use]
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    /// Set (or overwrite) a named variable.
    pub fn set_var(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.vars.insert(key.into(), value);
        self
    }

    /// Remove a named variable, returning its previous value.
    pub fn delete_var(&mut self, key: &str) -> Option<Value> {
        self.vars.remove(key)
    }

    /// Look up a variable by name.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Append a message.
    pub fn add_message(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }

    /// Append an artifact.
    pub fn add_artifact(&mut self, artifact: Artifact) -> &mut Self {
        self.artifacts.push(artifact);
        self
    }

    /// Append a failure record.
    pub fn record_failure(&mut self, record: FailureRecord) -> &mut Self {
        self.errors.push(record);
        self
    }

    /// Clone this envelope for a parallel branch.
    ///
    /// The clone carries a forked trace (new span id, parent recorded) so
    /// events from sibling branches remain distinguishable.
    #[must_use]
    pub fn fork_branch(&self) -> Self {
        let mut branch = self.clone();
        branch.trace = self.trace.fork();
        branch
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

/// Fluent construction for envelopes.
///
/// ```
/// use warpline::envelope::Envelope;
/// use warpline::message::Message;
/// use serde_json::json;
///
/// let envelope = Envelope::builder()
///     .with_input(json!({"query": "weather"}))
///     .with_var("units", json!("celsius"))
///     .with_message(Message::system("You are a weather assistant"))
///     .build();
///
/// assert_eq!(envelope.messages.len(), 1);
/// assert_eq!(envelope.vars.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    input: Option<Value>,
    vars: FxHashMap<String, Value>,
    messages: Vec<Message>,
}

impl EnvelopeBuilder {
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_user_message(self, content: &str) -> Self {
        self.with_message(Message::user(content))
    }

    #[must_use]
    pub fn build(self) -> Envelope {
        let mut envelope = Envelope::new(self.input.unwrap_or(Value::Null));
        envelope.vars = self.vars;
        envelope.messages = self.messages;
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fork_keeps_run_id_and_records_parent() {
        let envelope = Envelope::new(json!("x"));
        let branch = envelope.fork_branch();
        assert_eq!(branch.trace.run_id, envelope.trace.run_id);
        assert_eq!(
            branch.trace.parent_span_id.as_deref(),
            Some(envelope.trace.span_id.as_str())
        );
        assert_ne!(branch.trace.span_id, envelope.trace.span_id);
    }

    #[test]
    fn fork_is_isolated_from_origin() {
        let mut envelope = Envelope::new(Value::Null);
        envelope.set_var("shared", json!(1));
        let mut branch = envelope.fork_branch();
        branch.set_var("shared", json!(2));
        branch.add_message(Message::assistant("branch only"));

        assert_eq!(envelope.var("shared"), Some(&json!(1)));
        assert!(envelope.messages.is_empty());
    }

    #[test]
    fn builder_seeds_vars_and_messages() {
        let envelope = Envelope::builder()
            .with_var("a", json!(true))
            .with_user_message("hi")
            .build();
        assert_eq!(envelope.var("a"), Some(&json!(true)));
        assert_eq!(envelope.messages[0].role, Message::USER);
    }
}
