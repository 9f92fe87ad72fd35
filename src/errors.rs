//! Structured failure records accumulated on the envelope.
//!
//! When a node fails and its error policy is `record`, the engine appends a
//! [`FailureRecord`] to the envelope instead of aborting the run. Records are
//! serde-friendly so downstream consumers (event sinks, UIs, storage) can
//! persist and replay them without knowing the engine's error enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A failure captured during a run, with scope, error chain, tags, and
/// free-form context.
///
/// # Examples
///
/// ```
/// use warpline::errors::{ErrorDetail, FailureRecord};
/// use warpline::types::NodeKind;
/// use serde_json::json;
///
/// let record = FailureRecord::node("summarize", NodeKind::Llm, ErrorDetail::msg("provider timeout"))
///     .with_tag("retryable")
///     .with_context(json!({"attempts": 3}));
///
/// let json_str = serde_json::to_string(&record).unwrap();
/// assert!(json_str.contains("provider timeout"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FailureRecord {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: FailureScope,
    #[serde(default)]
    pub error: ErrorDetail,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl FailureRecord {
    /// Create a node-scoped failure record.
    pub fn node<S: Into<String>>(id: S, kind: crate::types::NodeKind, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: FailureScope::Node {
                id: id.into(),
                kind: kind.as_str().to_string(),
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create an engine-scoped failure record.
    pub fn engine<S: Into<String>>(run_id: S, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: FailureScope::Engine {
                run_id: run_id.into(),
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Add a single tag to this record.
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach free-form context metadata.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Where in the system a failure originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FailureScope {
    /// A node's run (or merge) operation failed.
    Node { id: String, kind: String },
    /// The engine itself recorded a failure.
    Engine { run_id: String },
    /// Scope unknown or not yet assigned.
    #[default]
    Unscoped,
}

/// A serializable error chain: message, optional cause, structured details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorDetail>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for ErrorDetail {
    fn default() -> Self {
        ErrorDetail {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorDetail {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl ErrorDetail {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        ErrorDetail {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: ErrorDetail) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    #[test]
    fn node_record_carries_scope() {
        let record = FailureRecord::node("fetch", NodeKind::Tool, ErrorDetail::msg("boom"));
        match &record.scope {
            FailureScope::Node { id, kind } => {
                assert_eq!(id, "fetch");
                assert_eq!(kind, "tool");
            }
            other => panic!("unexpected scope: {other:?}"),
        }
    }

    #[test]
    fn error_chain_preserves_cause() {
        let detail = ErrorDetail::msg("outer").with_cause(ErrorDetail::msg("inner"));
        let source = std::error::Error::source(&detail).expect("cause present");
        assert_eq!(source.to_string(), "inner");
    }
}
