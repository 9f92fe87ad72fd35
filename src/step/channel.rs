//! Channel/queue controller: decouple the engine from an external debugger.
//!
//! The engine pushes [`StepRequest`]s onto a bounded outgoing queue and
//! awaits responses on a bounded incoming queue. Because multiple branches
//! may pause concurrently, a response can arrive for a request some *other*
//! branch is waiting on; such responses are stashed (never consumed) so the
//! correct waiter eventually receives them.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use tokio::sync::Notify;

use super::{StepAction, StepController, StepError, StepPoint, StepRequest, StepResponse};

/// Pausing regime the controller is currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PauseMode {
    /// Pause at every point the filter allows.
    All,
    /// Pause only at named breakpoints.
    BreakpointsOnly,
    /// `run_to_breakpoint` issued: skip everything until a breakpoint hits,
    /// then fall back to `BreakpointsOnly`.
    RunToBreakpoint,
}

/// Consumer-side handles for driving a [`ChannelStepController`].
///
/// The debugger UI (or a test) receives requests from `requests` and answers
/// through `responses`. Dropping either handle disconnects the controller:
/// the next pause fails the run with [`StepError::Disconnected`].
pub struct StepChannelHandle {
    /// Requests flowing out of the engine.
    pub requests: flume::Receiver<StepRequest>,
    /// Responses flowing back in.
    pub responses: flume::Sender<StepResponse>,
}

/// Queue-based controller with named breakpoints and point filters.
///
/// # Examples
///
/// ```
/// use warpline::step::{ChannelStepController, StepController, StepPoint};
///
/// let (controller, handle) = ChannelStepController::new(16);
/// let controller = controller
///     .with_breakpoints(["review", "publish"])
///     .with_point_filter(true, false); // before_node only
///
/// assert!(controller.should_pause("review", StepPoint::BeforeNode));
/// assert!(!controller.should_pause("other", StepPoint::BeforeNode));
/// # drop(handle);
/// ```
pub struct ChannelStepController {
    requests_tx: flume::Sender<StepRequest>,
    responses_rx: flume::Receiver<StepResponse>,
    /// Responses addressed to requests other branches are waiting on.
    stash: Mutex<Vec<StepResponse>>,
    stash_notify: Notify,
    breakpoints: FxHashSet<String>,
    pause_before: bool,
    pause_after: bool,
    mode: Mutex<PauseMode>,
}

impl ChannelStepController {
    /// Create the controller plus the consumer-side handle. Both queues are
    /// bounded to `capacity`.
    pub fn new(capacity: usize) -> (Self, StepChannelHandle) {
        let (requests_tx, requests_rx) = flume::bounded(capacity.max(1));
        let (responses_tx, responses_rx) = flume::bounded(capacity.max(1));
        let controller = Self {
            requests_tx,
            responses_rx,
            stash: Mutex::new(Vec::new()),
            stash_notify: Notify::new(),
            breakpoints: FxHashSet::default(),
            pause_before: true,
            pause_after: true,
            mode: Mutex::new(PauseMode::All),
        };
        let handle = StepChannelHandle {
            requests: requests_rx,
            responses: responses_tx,
        };
        (controller, handle)
    }

    /// Restrict pausing to the named node ids.
    #[must_use]
    pub fn with_breakpoints<I, S>(mut self, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.breakpoints = node_ids.into_iter().map(Into::into).collect();
        if !self.breakpoints.is_empty()
            && let Ok(mut mode) = self.mode.lock()
        {
            *mode = PauseMode::BreakpointsOnly;
        }
        self
    }

    /// Restrict which points pause at all.
    #[must_use]
    pub fn with_point_filter(mut self, pause_before: bool, pause_after: bool) -> Self {
        self.pause_before = pause_before;
        self.pause_after = pause_after;
        self
    }

    fn point_allowed(&self, point: StepPoint) -> bool {
        match point {
            StepPoint::BeforeNode => self.pause_before,
            StepPoint::AfterNode => self.pause_after,
        }
    }

    fn take_stashed(&self, request_id: &str) -> Option<StepResponse> {
        let mut stash = self.stash.lock().ok()?;
        let index = stash.iter().position(|r| r.request_id == request_id)?;
        Some(stash.swap_remove(index))
    }

    fn stash_response(&self, response: StepResponse) {
        if let Ok(mut stash) = self.stash.lock() {
            stash.push(response);
        }
        // Wake sibling waiters so they re-check the stash.
        self.stash_notify.notify_waiters();
    }

    fn note_action(&self, node_id: &str, action: StepAction) {
        let Ok(mut mode) = self.mode.lock() else {
            return;
        };
        if action == StepAction::RunToBreakpoint {
            *mode = PauseMode::RunToBreakpoint;
        } else if *mode == PauseMode::RunToBreakpoint && self.breakpoints.contains(node_id) {
            *mode = PauseMode::BreakpointsOnly;
        }
    }
}

#[async_trait]
impl StepController for ChannelStepController {
    async fn step(&self, request: StepRequest) -> Result<StepResponse, StepError> {
        let request_id = request.id.clone();
        let node_id = request.node_id.clone();
        self.requests_tx
            .send_async(request)
            .await
            .map_err(|_| StepError::Disconnected)?;

        loop {
            // Register for stash wake-ups before checking the stash; a
            // notification between check and wait would otherwise be lost.
            let notified = self.stash_notify.notified();
            if let Some(response) = self.take_stashed(&request_id) {
                self.note_action(&node_id, response.action);
                return Ok(response);
            }
            tokio::select! {
                received = self.responses_rx.recv_async() => {
                    let response = received.map_err(|_| StepError::Disconnected)?;
                    if response.request_id == request_id {
                        self.note_action(&node_id, response.action);
                        return Ok(response);
                    }
                    // Not ours: requeue for the branch that owns it.
                    self.stash_response(response);
                }
                _ = notified => {}
            }
        }
    }

    fn should_pause(&self, node_id: &str, point: StepPoint) -> bool {
        if !self.point_allowed(point) {
            return false;
        }
        let mode = match self.mode.lock() {
            Ok(mode) => *mode,
            Err(_) => return false,
        };
        match mode {
            PauseMode::All => true,
            PauseMode::BreakpointsOnly | PauseMode::RunToBreakpoint => {
                self.breakpoints.contains(node_id)
            }
        }
    }
}

/// Convenience for tests and simple tools: answer every incoming request
/// with `continue` on a background task until the queue closes.
pub fn auto_continue(handle: StepChannelHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut answered: HashSet<String> = HashSet::new();
        while let Ok(request) = handle.requests.recv_async().await {
            if !answered.insert(request.id.clone()) {
                continue;
            }
            if handle
                .responses
                .send_async(StepResponse::proceed(&request.id))
                .await
                .is_err()
            {
                break;
            }
        }
    })
}
