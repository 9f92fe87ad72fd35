//! Core identifier types shared across the warpline engine.
//!
//! A node in a pipeline graph has two identities: a unique string id (its
//! address inside one graph) and a [`NodeKind`] describing the behavior
//! category it belongs to. The engine never interprets a kind beyond tagging
//! events and errors with it; the single exception is [`NodeKind::Router`],
//! which additionally receives a `route.decision` event after it runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Behavior category of a node.
///
/// Kinds are descriptive tags: the engine invokes every node through the same
/// [`Node`](crate::node::Node) contract regardless of kind. Concrete node
/// implementations (LLM calls, tool invocations, routers, transforms, ...)
/// live outside the engine and pick the kind that describes them.
///
/// # Examples
///
/// ```rust
/// use warpline::types::NodeKind;
///
/// let kind = NodeKind::Router;
/// assert_eq!(kind.as_str(), "router");
///
/// let custom = NodeKind::Custom("scorer".into());
/// assert_eq!(custom.to_string(), "scorer");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Language-model invocation.
    Llm,
    /// External tool invocation.
    Tool,
    /// Routing node; the engine emits a `route.decision` event after it runs.
    Router,
    /// Pure data transformation.
    Transform,
    /// Content filter.
    Filter,
    /// Conditional gate.
    Gate,
    /// Response cache.
    Cache,
    /// Policy/guardrail check.
    Guardian,
    /// Human-in-the-loop touchpoint.
    Human,
    /// Terminal output sink.
    Sink,
    /// Fan-in node implementing the merge capability.
    Merge,
    /// Application-defined category.
    Custom(String),
}

impl NodeKind {
    /// Stable string form used in events, logs, and serialized failures.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Llm => "llm",
            NodeKind::Tool => "tool",
            NodeKind::Router => "router",
            NodeKind::Transform => "transform",
            NodeKind::Filter => "filter",
            NodeKind::Gate => "gate",
            NodeKind::Cache => "cache",
            NodeKind::Guardian => "guardian",
            NodeKind::Human => "human",
            NodeKind::Sink => "sink",
            NodeKind::Merge => "merge",
            NodeKind::Custom(name) => name.as_str(),
        }
    }

    /// Returns `true` for router nodes.
    #[must_use]
    pub fn is_router(&self) -> bool {
        matches!(self, NodeKind::Router)
    }

    /// Returns `true` for merge nodes.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        matches!(self, NodeKind::Merge)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "llm" => NodeKind::Llm,
            "tool" => NodeKind::Tool,
            "router" => NodeKind::Router,
            "transform" => NodeKind::Transform,
            "filter" => NodeKind::Filter,
            "gate" => NodeKind::Gate,
            "cache" => NodeKind::Cache,
            "guardian" => NodeKind::Guardian,
            "human" => NodeKind::Human,
            "sink" => NodeKind::Sink,
            "merge" => NodeKind::Merge,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}
