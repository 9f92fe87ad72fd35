use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::NodeKind;
use crate::utils::collections::new_payload_map;

/// Dot-delimited category of an event.
///
/// The first event of every run is [`EventKind::RunStarted`] and the last is
/// [`EventKind::RunFinished`]; everything in between describes node execution
/// and step-protocol activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "run.started")]
    RunStarted,
    #[serde(rename = "run.finished")]
    RunFinished,
    #[serde(rename = "node.started")]
    NodeStarted,
    #[serde(rename = "node.finished")]
    NodeFinished,
    #[serde(rename = "node.failed")]
    NodeFailed,
    #[serde(rename = "node.message")]
    NodeMessage,
    #[serde(rename = "route.decision")]
    RouteDecision,
    #[serde(rename = "step.paused")]
    StepPaused,
    #[serde(rename = "step.resumed")]
    StepResumed,
    #[serde(rename = "step.skipped")]
    StepSkipped,
    #[serde(rename = "step.aborted")]
    StepAborted,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run.started",
            EventKind::RunFinished => "run.finished",
            EventKind::NodeStarted => "node.started",
            EventKind::NodeFinished => "node.finished",
            EventKind::NodeFailed => "node.failed",
            EventKind::NodeMessage => "node.message",
            EventKind::RouteDecision => "route.decision",
            EventKind::StepPaused => "step.paused",
            EventKind::StepResumed => "step.resumed",
            EventKind::StepSkipped => "step.skipped",
            EventKind::StepAborted => "step.aborted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trace identifiers attached to an event by a trace-enriching emitter
/// decorator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub run_id: String,
    pub span_id: String,
}

/// A structured, timestamped record describing one thing that happened
/// during a run.
///
/// Sequence numbers are assigned by the emitter at the point of emission and
/// are strictly increasing per run, so any single subscriber observes events
/// in nondecreasing logical order. Because branches execute concurrently,
/// inter-branch ordering beyond the sequence number is not defined.
///
/// # Examples
///
/// ```
/// use warpline::event_bus::{Event, EventKind};
///
/// let event = Event::new(EventKind::RunStarted, "run-1");
/// assert_eq!(event.kind.as_str(), "run.started");
/// assert_eq!(event.seq, 0); // assigned at emission
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Category of this event.
    pub kind: EventKind,
    /// Run the event belongs to.
    pub run_id: String,
    /// Node the event concerns, if any.
    pub node_id: Option<String>,
    /// Kind of that node, if any.
    pub node_kind: Option<NodeKind>,
    /// Per-run monotonically increasing sequence, assigned at emission.
    pub seq: u64,
    /// Wall-clock emission time.
    pub timestamp: DateTime<Utc>,
    /// Attempt number (1 unless a node reports internal retries).
    pub attempt: u32,
    /// Elapsed time for the operation the event closes, if applicable.
    pub elapsed_ms: Option<u64>,
    /// Small structured payload.
    pub payload: FxHashMap<String, Value>,
    /// Trace identifiers, present when trace enrichment is attached.
    pub trace: Option<TraceContext>,
}

impl Event {
    /// Bare event with the given kind and run id. Sequence and timestamp are
    /// filled in by the emitter.
    #[must_use]
    pub fn new(kind: EventKind, run_id: impl Into<String>) -> Self {
        Self {
            kind,
            run_id: run_id.into(),
            node_id: None,
            node_kind: None,
            seq: 0,
            timestamp: Utc::now(),
            attempt: 1,
            elapsed_ms: None,
            payload: new_payload_map(),
            trace: None,
        }
    }

    /// Event scoped to a node.
    #[must_use]
    pub fn for_node(
        kind: EventKind,
        run_id: impl Into<String>,
        node_id: impl Into<String>,
        node_kind: NodeKind,
    ) -> Self {
        let mut event = Self::new(kind, run_id);
        event.node_id = Some(node_id.into());
        event.node_kind = Some(node_kind);
        event
    }

    #[must_use]
    pub fn with_payload_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Convert to a normalized JSON object.
    ///
    /// ```
    /// use warpline::event_bus::{Event, EventKind};
    /// use warpline::types::NodeKind;
    ///
    /// let event = Event::for_node(EventKind::NodeStarted, "run-1", "fetch", NodeKind::Tool);
    /// let json = event.to_json_value();
    /// assert_eq!(json["kind"], "node.started");
    /// assert_eq!(json["node_id"], "fetch");
    /// ```
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        use serde_json::json;

        let mut object = serde_json::Map::new();
        object.insert("kind".into(), json!(self.kind.as_str()));
        object.insert("run_id".into(), json!(self.run_id));
        object.insert("seq".into(), json!(self.seq));
        object.insert("timestamp".into(), json!(self.timestamp.to_rfc3339()));
        object.insert("attempt".into(), json!(self.attempt));
        if let Some(node_id) = &self.node_id {
            object.insert("node_id".into(), json!(node_id));
        }
        if let Some(node_kind) = &self.node_kind {
            object.insert("node_kind".into(), json!(node_kind.as_str()));
        }
        if let Some(elapsed_ms) = self.elapsed_ms {
            object.insert("elapsed_ms".into(), json!(elapsed_ms));
        }
        if !self.payload.is_empty() {
            let mut payload = serde_json::Map::new();
            let mut keys: Vec<_> = self.payload.keys().collect();
            keys.sort();
            for key in keys {
                payload.insert(key.clone(), self.payload[key].clone());
            }
            object.insert("payload".into(), Value::Object(payload));
        }
        if let Some(trace) = &self.trace {
            object.insert(
                "trace".into(),
                json!({"run_id": trace.run_id, "span_id": trace.span_id}),
            );
        }
        Value::Object(object)
    }

    /// Compact JSON string form.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(node_id) => write!(f, "#{} {} [{}]", self.seq, self.kind, node_id),
            None => write!(f, "#{} {}", self.seq, self.kind),
        }
    }
}
