//! The execution engine: graph traversal, branch concurrency, merge
//! barriers, error policy, event emission, and step-point interception.
//!
//! Traversal walks node-by-node from the graph's entry. Single-successor
//! chains stay on the calling task; a node with several successors clones
//! the envelope once per branch and spawns one task per branch. Branches
//! converge at merge nodes: every sibling deposits its envelope at the
//! barrier and the completing arrival carries the collected inputs through
//! the merge operation and onward. A child cancellation token threads
//! through every suspension point so cancellation (and fatal errors, which
//! cancel siblings) unwind promptly.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::error::RuntimeError;
use super::merge::{Arrival, MergeBarriers};
use super::options::{RunOptions, StepConfig};
use crate::envelope::{Envelope, Trace};
use crate::errors::{ErrorDetail, FailureRecord};
use crate::event_bus::{Event, EventEmitter, EventKind, RunEmitter};
use crate::graph::Graph;
use crate::node::{ErrorPolicy, Node, NodeContext};
use crate::step::{
    EnvelopePatch, GraphContext, StepAction, StepController, StepPoint, StepRequest, StepResponse,
};

/// The execution engine.
///
/// A `Runtime` owns one [`RunOptions`] bundle and can execute any number of
/// runs with it; each run is independent. Construction is cheap.
///
/// # Examples
///
/// ```no_run
/// use warpline::envelope::Envelope;
/// use warpline::runtime::{RunOptions, Runtime};
/// use serde_json::json;
///
/// # async fn example(graph: warpline::graph::Graph) -> Result<(), warpline::runtime::RuntimeError> {
/// let runtime = Runtime::new(RunOptions::default());
/// let final_envelope = runtime.run(&graph, Envelope::new(json!("go"))).await?;
/// println!("vars: {:?}", final_envelope.vars);
/// # Ok(())
/// # }
/// ```
pub struct Runtime {
    options: RunOptions,
}

impl Runtime {
    #[must_use]
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Runtime with stock options (no events, no stepping, env-derived
    /// limits).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RunOptions::default())
    }

    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute the graph against the envelope until a terminal node is
    /// reached, returning the final envelope.
    ///
    /// Emits `run.started` first and `run.finished` last (always, even when
    /// the run fails or is cancelled). On fatal failure the error is returned
    /// and no envelope survives; under `continue` / `record` error policies
    /// the returned envelope documents what failed instead.
    #[instrument(
        skip_all,
        fields(run_id = %envelope.trace.run_id, entry = %graph.entry()),
        err
    )]
    pub async fn run(&self, graph: &Graph, envelope: Envelope) -> Result<Envelope, RuntimeError> {
        let run_id = envelope.trace.run_id.clone();
        let root_trace = envelope.trace.clone();

        if let Some(bus) = &self.options.event_bus {
            bus.listen_for_events();
        }
        let base: Arc<dyn EventEmitter> = Arc::new(RunEmitter::new(
            self.options.event_handler.clone(),
            self.options.event_bus.clone(),
            self.options.now.clone(),
        ));
        let emitter = match &self.options.emitter_decorator {
            Some(decorate) => decorate(base),
            None => base,
        };

        let cancel = self.options.cancellation.child_token();
        let executor = Arc::new(Executor {
            graph: graph.clone(),
            run_id: run_id.clone(),
            root_trace,
            emitter,
            controller: self.options.step_controller.clone(),
            step_config: self.options.step_config.clone(),
            continue_on_error: self.options.continue_on_error,
            max_hops: self.options.max_hops,
            node_permits: Arc::new(Semaphore::new(self.options.concurrency.max(1))),
            barriers: MergeBarriers::new(),
            cancel: cancel.clone(),
        });

        let started = Instant::now();
        executor.emit(
            Event::new(EventKind::RunStarted, &run_id)
                .with_payload_entry("entry", json!(graph.entry()))
                .with_payload_entry("nodes", json!(graph.node_count())),
        );

        let outcome = Arc::clone(&executor)
            .drive(graph.entry().to_string(), envelope, None)
            .await;

        let result = match outcome {
            Ok(Some(final_envelope)) => Ok(final_envelope),
            Ok(None) => Err(RuntimeError::Stalled {
                node_id: graph.entry().to_string(),
            }),
            Err(error) => {
                cancel.cancel();
                Err(error)
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let finished = match &result {
            Ok(_) => Event::new(EventKind::RunFinished, &run_id)
                .with_payload_entry("status", json!("completed"))
                .with_elapsed_ms(elapsed_ms),
            Err(error) => Event::new(EventKind::RunFinished, &run_id)
                .with_payload_entry("status", json!("failed"))
                .with_payload_entry("error", json!(error.to_string()))
                .with_elapsed_ms(elapsed_ms),
        };
        executor.emit(finished);

        result
    }
}

/// Outcome of a resolved pause point.
enum PauseOutcome {
    Proceed,
    Skip,
}

/// Per-run traversal state shared by every branch task.
struct Executor {
    graph: Graph,
    run_id: String,
    root_trace: Trace,
    emitter: Arc<dyn EventEmitter>,
    controller: Option<Arc<dyn StepController>>,
    step_config: StepConfig,
    continue_on_error: bool,
    max_hops: u32,
    node_permits: Arc<Semaphore>,
    barriers: MergeBarriers,
    cancel: CancellationToken,
}

impl Executor {
    fn emit(&self, event: Event) {
        if let Err(error) = self.emitter.emit(event) {
            tracing::debug!(%error, "event emission failed");
        }
    }

    fn cancelled(&self) -> RuntimeError {
        RuntimeError::Cancelled {
            reason: "cancellation signal observed".to_string(),
        }
    }

    fn effective_policy(&self, node: &dyn Node) -> ErrorPolicy {
        let policy = node.error_policy();
        if self.continue_on_error && policy == ErrorPolicy::Fail {
            ErrorPolicy::Record
        } else {
            policy
        }
    }

    /// Walk one thread of control starting at `start`.
    ///
    /// Returns `Ok(Some(envelope))` when this thread reached a terminal node
    /// and `Ok(None)` when it ended at a merge barrier completed by a
    /// sibling branch.
    fn drive(
        self: Arc<Self>,
        start: String,
        envelope: Envelope,
        arrived_from: Option<String>,
    ) -> BoxFuture<'static, Result<Option<Envelope>, RuntimeError>> {
        Box::pin(async move {
            let mut node_id = start;
            let mut envelope = envelope;
            let mut arrived_from = arrived_from;
            loop {
                if self.cancel.is_cancelled() {
                    return Err(self.cancelled());
                }
                let node = self
                    .graph
                    .node(&node_id)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownNode {
                        id: node_id.clone(),
                    })?;

                let hop = envelope.trace.hops.saturating_add(1);
                if hop > self.max_hops {
                    return Err(RuntimeError::MaxHopsExceeded {
                        limit: self.max_hops,
                        node_id,
                    });
                }
                envelope.trace.hops = hop;

                if node.as_merge().is_some() {
                    match self
                        .merge_phase(&node, &node_id, envelope, arrived_from.as_deref())
                        .await?
                    {
                        Some(merged) => envelope = merged,
                        None => return Ok(None),
                    }
                } else {
                    envelope = self.node_phase(&node, &node_id, envelope).await?;
                }

                let successors = self.graph.successors(&node_id).to_vec();
                if node.kind().is_router() {
                    self.emit(
                        Event::for_node(
                            EventKind::RouteDecision,
                            &self.run_id,
                            &node_id,
                            node.kind(),
                        )
                        .with_payload_entry("targets", json!(successors)),
                    );
                }

                match successors.len() {
                    0 => return Ok(Some(envelope)),
                    1 => {
                        let next = successors
                            .into_iter()
                            .next()
                            .expect("exactly one successor");
                        arrived_from = Some(std::mem::replace(&mut node_id, next));
                    }
                    _ => {
                        return Arc::clone(&self)
                            .fan_out(&node_id, successors, envelope)
                            .await;
                    }
                }
            }
        })
    }

    /// Run one ordinary node: before-pause, execution, error policy,
    /// after-pause.
    async fn node_phase(
        &self,
        node: &Arc<dyn Node>,
        node_id: &str,
        mut envelope: Envelope,
    ) -> Result<Envelope, RuntimeError> {
        if let Some((outcome, patch)) = self
            .resolve_pause(StepPoint::BeforeNode, node, node_id, &envelope, None)
            .await?
        {
            match outcome {
                PauseOutcome::Skip => return Ok(envelope),
                PauseOutcome::Proceed => {
                    if let Some(patch) = patch {
                        patch.apply(&mut envelope);
                    }
                }
            }
        }

        let kind = node.kind();
        self.emit(
            Event::for_node(EventKind::NodeStarted, &self.run_id, node_id, kind.clone())
                .with_payload_entry("hop", json!(envelope.trace.hops)),
        );

        let ctx = NodeContext {
            run_id: self.run_id.clone(),
            node_id: node_id.to_string(),
            node_kind: kind.clone(),
            hop: envelope.trace.hops,
            event_emitter: self.emitter.clone(),
        };

        let started = Instant::now();
        let run_result = {
            let _permit = self
                .node_permits
                .acquire()
                .await
                .map_err(|_| self.cancelled())?;
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(self.cancelled()),
                result = node.run(ctx, envelope.clone()) => result,
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut node_error: Option<String> = None;
        match run_result {
            Ok(next) => {
                envelope = next;
                self.emit(
                    Event::for_node(EventKind::NodeFinished, &self.run_id, node_id, kind.clone())
                        .with_elapsed_ms(elapsed_ms),
                );
            }
            Err(error) => {
                let policy = self.effective_policy(node.as_ref());
                self.emit(
                    Event::for_node(EventKind::NodeFailed, &self.run_id, node_id, kind.clone())
                        .with_elapsed_ms(elapsed_ms)
                        .with_payload_entry("error", json!(error.to_string()))
                        .with_payload_entry("policy", json!(policy_label(policy))),
                );
                match policy {
                    ErrorPolicy::Fail => {
                        return Err(RuntimeError::Node {
                            id: node_id.to_string(),
                            kind,
                            source: error,
                        });
                    }
                    ErrorPolicy::Continue => {
                        tracing::warn!(
                            node = node_id,
                            %error,
                            "node failed; continuing with pre-failure envelope"
                        );
                        node_error = Some(error.to_string());
                    }
                    ErrorPolicy::Record => {
                        let message = error.to_string();
                        envelope.record_failure(FailureRecord::node(
                            node_id,
                            kind.clone(),
                            ErrorDetail::msg(&message),
                        ));
                        node_error = Some(message);
                    }
                }
            }
        }

        if let Some((_outcome, patch)) = self
            .resolve_pause(
                StepPoint::AfterNode,
                node,
                node_id,
                &envelope,
                node_error.as_deref(),
            )
            .await?
        {
            // The node already ran: a skip here is a no-op, and envelope
            // patches are only honored at the before point.
            if patch.as_ref().is_some_and(|p| !p.is_empty()) {
                tracing::warn!(node = node_id, "envelope patch ignored outside before_node");
            }
        }

        Ok(envelope)
    }

    /// Barrier handling for merge nodes.
    ///
    /// Every branch arriving at the merge deposits its envelope; the
    /// completing arrival collects the inputs, runs the step points and the
    /// merge operation, and resumes traversal. All other branches return
    /// `None` once the barrier fires.
    async fn merge_phase(
        &self,
        node: &Arc<dyn Node>,
        node_id: &str,
        envelope: Envelope,
        arrived_from: Option<&str>,
    ) -> Result<Option<Envelope>, RuntimeError> {
        let merge = node.as_merge().expect("caller checked merge capability");
        let predecessors = self.graph.predecessors(node_id);
        let slot = arrived_from
            .and_then(|from| predecessors.iter().position(|p| p == from))
            .unwrap_or(0);
        let expected = merge.expected_inputs().unwrap_or(predecessors.len());
        let hop = envelope.trace.hops;

        // A barrier expecting more inputs than the graph can deliver would
        // park every arriving branch forever.
        if expected > predecessors.len() {
            return Err(RuntimeError::Stalled {
                node_id: node_id.to_string(),
            });
        }

        let inputs = if expected == 0 {
            Vec::new()
        } else {
            match self
                .barriers
                .arrive(node_id, slot, predecessors.len(), expected, envelope)
            {
                Arrival::Complete(inputs) => inputs,
                Arrival::Pending(mut fired) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(self.cancelled()),
                        result = fired.wait_for(|fired| *fired) => {
                            result.map_err(|_| self.cancelled())?;
                        }
                    }
                    return Ok(None);
                }
            }
        };

        // Only the completing branch runs past this point, so the merge
        // node's step points and events fire exactly once per run.
        let kind = node.kind();
        let input_count = inputs.len();
        let max_input_hops = inputs.iter().map(|e| e.trace.hops).max().unwrap_or(hop);
        let snapshot = inputs.first().cloned().unwrap_or_else(|| {
            let mut empty = Envelope::empty_with_trace(self.root_trace.clone());
            empty.trace.hops = hop;
            empty
        });

        let mut held_patch: Option<EnvelopePatch> = None;
        let mut skip_strategy = false;
        if let Some((outcome, patch)) = self
            .resolve_pause(StepPoint::BeforeNode, node, node_id, &snapshot, None)
            .await?
        {
            match outcome {
                PauseOutcome::Skip => skip_strategy = true,
                PauseOutcome::Proceed => held_patch = patch,
            }
        }

        if skip_strategy {
            let mut merged = inputs.into_iter().next().unwrap_or(snapshot);
            merged.trace.hops = merged.trace.hops.max(hop);
            self.resolve_pause(StepPoint::AfterNode, node, node_id, &merged, None)
                .await?;
            return Ok(Some(merged));
        }

        self.emit(
            Event::for_node(EventKind::NodeStarted, &self.run_id, node_id, kind.clone())
                .with_payload_entry("hop", json!(hop))
                .with_payload_entry("inputs", json!(input_count)),
        );

        let started = Instant::now();
        let strategy_invoked = input_count >= 2;
        let mut merged = if input_count == 0 {
            snapshot
        } else if input_count == 1 {
            inputs.into_iter().next().expect("one input")
        } else {
            let ctx = NodeContext {
                run_id: self.run_id.clone(),
                node_id: node_id.to_string(),
                node_kind: kind.clone(),
                hop: max_input_hops,
                event_emitter: self.emitter.clone(),
            };
            let merge_result = {
                let _permit = self
                    .node_permits
                    .acquire()
                    .await
                    .map_err(|_| self.cancelled())?;
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(self.cancelled()),
                    result = merge.merge_inputs(ctx, inputs) => result,
                }
            };
            match merge_result {
                Ok(merged) => merged,
                Err(source) => {
                    self.emit(
                        Event::for_node(EventKind::NodeFailed, &self.run_id, node_id, kind)
                            .with_elapsed_ms(started.elapsed().as_millis() as u64)
                            .with_payload_entry("error", json!(source.to_string())),
                    );
                    return Err(RuntimeError::Merge {
                        id: node_id.to_string(),
                        source,
                    });
                }
            }
        };
        merged.trace.hops = merged.trace.hops.max(max_input_hops).max(hop);
        if let Some(patch) = held_patch {
            patch.apply(&mut merged);
        }

        self.emit(
            Event::for_node(EventKind::NodeFinished, &self.run_id, node_id, kind.clone())
                .with_elapsed_ms(started.elapsed().as_millis() as u64)
                .with_payload_entry("inputs", json!(input_count))
                .with_payload_entry("strategy_invoked", json!(strategy_invoked)),
        );

        self.resolve_pause(StepPoint::AfterNode, node, node_id, &merged, None)
            .await?;

        Ok(Some(merged))
    }

    /// Spawn one task per successor, join them all, and continue with the
    /// first (declaration-order) branch that reached a terminal node.
    async fn fan_out(
        self: Arc<Self>,
        node_id: &str,
        successors: Vec<String>,
        envelope: Envelope,
    ) -> Result<Option<Envelope>, RuntimeError> {
        tracing::debug!(node = node_id, branches = successors.len(), "fanning out");
        let mut branches = JoinSet::new();
        for (index, successor) in successors.into_iter().enumerate() {
            let executor = Arc::clone(&self);
            let branch_envelope = envelope.fork_branch();
            let from = node_id.to_string();
            branches.spawn(async move {
                (
                    index,
                    executor.drive(successor, branch_envelope, Some(from)).await,
                )
            });
        }

        let mut results: Vec<(usize, Result<Option<Envelope>, RuntimeError>)> = Vec::new();
        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if result.is_err() {
                        // Fatal failures cancel siblings; they observe the
                        // token at their next suspension point.
                        self.cancel.cancel();
                    }
                    results.push((index, result));
                }
                Err(join_error) => {
                    self.cancel.cancel();
                    while branches.join_next().await.is_some() {}
                    return Err(RuntimeError::Join(join_error));
                }
            }
        }
        results.sort_by_key(|(index, _)| *index);

        if results.iter().any(|(_, result)| result.is_err()) {
            // Prefer the original failure over the cancellations it caused.
            let mut errors: Vec<RuntimeError> = results
                .into_iter()
                .filter_map(|(_, result)| result.err())
                .collect();
            if let Some(position) = errors.iter().position(|e| !e.is_cancelled()) {
                return Err(errors.swap_remove(position));
            }
            return Err(errors.swap_remove(0));
        }

        Ok(results
            .into_iter()
            .filter_map(|(_, result)| result.ok().flatten())
            .next())
    }

    /// Emit `step.paused`, hand control to the controller, emit the
    /// resolution event, and translate the action.
    ///
    /// Returns `None` when no pause is configured for this point. Abort is
    /// converted into the distinguished error here.
    async fn resolve_pause(
        &self,
        point: StepPoint,
        node: &Arc<dyn Node>,
        node_id: &str,
        envelope: &Envelope,
        error: Option<&str>,
    ) -> Result<Option<(PauseOutcome, Option<EnvelopePatch>)>, RuntimeError> {
        let Some(controller) = &self.controller else {
            return Ok(None);
        };
        let allowed = match point {
            StepPoint::BeforeNode => self.step_config.pause_before,
            StepPoint::AfterNode => self.step_config.pause_after,
        };
        if !allowed || !controller.should_pause(node_id, point) {
            return Ok(None);
        }

        let graph_context = GraphContext {
            predecessors: self.graph.predecessors(node_id).to_vec(),
            successors: self.graph.successors(node_id).to_vec(),
        };
        let mut request = StepRequest::new(
            &self.run_id,
            point,
            node_id,
            node.kind(),
            envelope.clone(),
            graph_context,
        );
        if let Some(error) = error {
            request = request.with_error(error);
        }
        let request_id = request.id.clone();

        self.emit(
            Event::for_node(EventKind::StepPaused, &self.run_id, node_id, node.kind())
                .with_payload_entry("point", json!(point.as_str()))
                .with_payload_entry("request_id", json!(request_id.clone())),
        );

        let response = self.await_controller(controller, node_id, request).await?;
        let resolution = |kind: EventKind| {
            Event::for_node(kind, &self.run_id, node_id, node.kind())
                .with_payload_entry("point", json!(point.as_str()))
                .with_payload_entry("request_id", json!(request_id.clone()))
        };

        match response.action {
            StepAction::Abort => {
                self.emit(resolution(EventKind::StepAborted));
                Err(RuntimeError::Aborted {
                    node_id: node_id.to_string(),
                })
            }
            StepAction::Skip => {
                self.emit(resolution(EventKind::StepSkipped));
                Ok(Some((PauseOutcome::Skip, None)))
            }
            StepAction::Continue | StepAction::RunToBreakpoint => {
                self.emit(resolution(EventKind::StepResumed));
                Ok(Some((PauseOutcome::Proceed, response.patch)))
            }
        }
    }

    /// Await the controller response under the configured timeout and the
    /// run's cancellation signal.
    async fn await_controller(
        &self,
        controller: &Arc<dyn StepController>,
        node_id: &str,
        request: StepRequest,
    ) -> Result<StepResponse, RuntimeError> {
        let step_future = controller.step(request);
        let response = match self.step_config.step_timeout {
            Some(limit) => tokio::select! {
                _ = self.cancel.cancelled() => return Err(self.cancelled()),
                result = tokio::time::timeout(limit, step_future) => match result {
                    Ok(inner) => inner,
                    Err(_) => {
                        return Err(RuntimeError::StepTimeout {
                            node_id: node_id.to_string(),
                        });
                    }
                },
            },
            None => tokio::select! {
                _ = self.cancel.cancelled() => return Err(self.cancelled()),
                result = step_future => result,
            },
        };
        response.map_err(|source| RuntimeError::Step {
            node_id: node_id.to_string(),
            source,
        })
    }
}

fn policy_label(policy: ErrorPolicy) -> &'static str {
    match policy {
        ErrorPolicy::Fail => "fail",
        ErrorPolicy::Continue => "continue",
        ErrorPolicy::Record => "record",
    }
}
