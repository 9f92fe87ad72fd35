#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use warpline::envelope::Envelope;
use warpline::message::Message;
use warpline::node::{ErrorPolicy, MergeCapable, Node, NodeContext, NodeError};
use warpline::types::NodeKind;

/// Appends its id to the `trail` array var, sets `<id> = true` and
/// `branch = <id>`, and counts how often it ran.
pub struct TagNode {
    pub id: &'static str,
    pub kind: NodeKind,
    pub delay: Duration,
    pub runs: Arc<AtomicUsize>,
}

impl TagNode {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            kind: NodeKind::Transform,
            delay: Duration::ZERO,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn run_counter(&self) -> Arc<AtomicUsize> {
        self.runs.clone()
    }
}

#[async_trait]
impl Node for TagNode {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        self.kind.clone()
    }

    async fn run(&self, _ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.runs.fetch_add(1, Ordering::SeqCst);

        let mut trail = envelope
            .var("trail")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        trail.push(json!(self.id));
        envelope.set_var("trail", Value::Array(trail));
        envelope.set_var(self.id, json!(true));
        envelope.set_var("branch", json!(self.id));
        envelope.add_message(Message::assistant(&format!("ran:{}", self.id)));
        Ok(envelope)
    }
}

/// Fails every time with the configured policy.
pub struct FailNode {
    pub id: &'static str,
    pub policy: ErrorPolicy,
    pub runs: Arc<AtomicUsize>,
}

impl FailNode {
    pub fn new(id: &'static str, policy: ErrorPolicy) -> Self {
        Self {
            id,
            policy,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn run_counter(&self) -> Arc<AtomicUsize> {
        self.runs.clone()
    }
}

#[async_trait]
impl Node for FailNode {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Tool
    }

    fn error_policy(&self) -> ErrorPolicy {
        self.policy
    }

    async fn run(&self, _ctx: NodeContext, _envelope: Envelope) -> Result<Envelope, NodeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Err(NodeError::Provider {
            provider: "test",
            message: format!("{} always fails", self.id),
        })
    }
}

/// Records the vars it observed so tests can assert branch isolation.
pub struct CaptureNode {
    pub id: &'static str,
    pub seen: Arc<Mutex<Vec<Vec<String>>>>,
    pub delay: Duration,
}

impl CaptureNode {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            seen: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn observations(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl Node for CaptureNode {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    async fn run(&self, _ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut keys: Vec<String> = envelope.vars.keys().cloned().collect();
        keys.sort();
        self.seen.lock().unwrap().push(keys);
        envelope.set_var(self.id, json!(true));
        Ok(envelope)
    }
}

/// Merge node: first input is the base, later inputs contribute missing vars
/// and their messages; `branch_order` records each input's `branch` var in
/// collection order.
pub struct UnionMerge {
    pub id: &'static str,
    pub expected: Option<usize>,
    pub invocations: Arc<AtomicUsize>,
}

impl UnionMerge {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            expected: None,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_expected(mut self, expected: usize) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn invocation_counter(&self) -> Arc<AtomicUsize> {
        self.invocations.clone()
    }
}

#[async_trait]
impl Node for UnionMerge {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Merge
    }

    async fn run(&self, _ctx: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        Ok(envelope)
    }

    fn as_merge(&self) -> Option<&dyn MergeCapable> {
        Some(self)
    }
}

#[async_trait]
impl MergeCapable for UnionMerge {
    fn expected_inputs(&self) -> Option<usize> {
        self.expected
    }

    async fn merge_inputs(
        &self,
        _ctx: NodeContext,
        inputs: Vec<Envelope>,
    ) -> Result<Envelope, NodeError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let branch_order: Vec<Value> = inputs
            .iter()
            .map(|input| input.var("branch").cloned().unwrap_or(Value::Null))
            .collect();

        let mut iter = inputs.into_iter();
        let mut merged = iter.next().expect("merge called with at least two inputs");
        for input in iter {
            for (key, value) in input.vars {
                merged.vars.entry(key).or_insert(value);
            }
            merged.messages.extend(input.messages);
            merged.artifacts.extend(input.artifacts);
            merged.errors.extend(input.errors);
        }
        merged.set_var("branch_order", Value::Array(branch_order));
        Ok(merged)
    }
}

/// Merge node whose strategy always fails.
pub struct FailingMerge {
    pub id: &'static str,
}

#[async_trait]
impl Node for FailingMerge {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Merge
    }

    async fn run(&self, _ctx: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        Ok(envelope)
    }

    fn as_merge(&self) -> Option<&dyn MergeCapable> {
        Some(self)
    }
}

#[async_trait]
impl MergeCapable for FailingMerge {
    async fn merge_inputs(
        &self,
        _ctx: NodeContext,
        _inputs: Vec<Envelope>,
    ) -> Result<Envelope, NodeError> {
        Err(NodeError::ValidationFailed("inputs disagree".to_string()))
    }
}

/// Emits one `node.message` event while running.
pub struct ChattyNode {
    pub id: &'static str,
}

#[async_trait]
impl Node for ChattyNode {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    async fn run(&self, ctx: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        ctx.emit("thinking out loud")?;
        Ok(envelope)
    }
}
