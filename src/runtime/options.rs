//! Run configuration.
//!
//! [`RunOptions`] collects everything the engine needs beyond the graph and
//! the envelope: event wiring, the step controller, concurrency and hop
//! limits, the cancellation token, and an injectable clock. Defaults come
//! from the environment where that makes sense (`WARPLINE_MAX_HOPS`), with
//! `dotenvy` loading a local `.env` first.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::event_bus::{EmitterDecorator, EventBus, EventHandler, NowFn};
use crate::step::StepController;

/// Default bound on nodes visited per branch before the run is failed.
pub const DEFAULT_MAX_HOPS: u32 = 128;

/// Which step points pause and how long the engine waits for the controller.
#[derive(Clone, Debug)]
pub struct StepConfig {
    /// Allow pauses before a node's run operation.
    pub pause_before: bool,
    /// Allow pauses after a node's run operation.
    pub pause_after: bool,
    /// Upper bound on waiting for a controller response.
    pub step_timeout: Option<Duration>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            pause_before: true,
            pause_after: true,
            step_timeout: None,
        }
    }
}

/// Configuration for one call to [`Runtime::run`](crate::runtime::Runtime::run).
///
/// # Examples
///
/// ```
/// use warpline::runtime::RunOptions;
/// use warpline::event_bus::{EventBus, MemorySink};
///
/// let sink = MemorySink::new();
/// let options = RunOptions::default()
///     .with_event_bus(EventBus::with_sink(sink.clone()))
///     .with_concurrency(4)
///     .with_max_hops(64);
/// assert_eq!(options.max_hops, 64);
/// ```
#[derive(Clone)]
pub struct RunOptions {
    /// Synchronous handler invoked inline for every event.
    pub event_handler: Option<EventHandler>,
    /// Bus every event is forwarded to, independent of the handler.
    pub event_bus: Option<EventBus>,
    /// Wraps the emitter, e.g. to attach trace context.
    pub emitter_decorator: Option<EmitterDecorator>,
    /// Debugging-protocol controller; absent means never pause.
    pub step_controller: Option<Arc<dyn StepController>>,
    /// Step-point configuration.
    pub step_config: StepConfig,
    /// Cap on concurrently executing nodes across parallel branches.
    pub concurrency: usize,
    /// Degrade fail-policy nodes to record-policy, keeping the run alive.
    pub continue_on_error: bool,
    /// Bound on nodes visited per branch; exceeding it is fatal.
    pub max_hops: u32,
    /// Cancellation signal threaded through the whole run.
    pub cancellation: CancellationToken,
    /// Injectable clock for deterministic timestamps in tests.
    pub now: Option<NowFn>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            event_handler: None,
            event_bus: None,
            emitter_decorator: None,
            step_controller: None,
            step_config: StepConfig::default(),
            concurrency: default_concurrency(),
            continue_on_error: false,
            max_hops: resolve_max_hops(),
            cancellation: CancellationToken::new(),
            now: None,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn with_event_handler(mut self, handler: EventHandler) -> Self {
        self.event_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_emitter_decorator(mut self, decorator: EmitterDecorator) -> Self {
        self.emitter_decorator = Some(decorator);
        self
    }

    #[must_use]
    pub fn with_step_controller(mut self, controller: Arc<dyn StepController>) -> Self {
        self.step_controller = Some(controller);
        self
    }

    #[must_use]
    pub fn with_step_config(mut self, config: StepConfig) -> Self {
        self.step_config = config;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn with_now(mut self, now: NowFn) -> Self {
        self.now = Some(now);
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("has_event_handler", &self.event_handler.is_some())
            .field("has_event_bus", &self.event_bus.is_some())
            .field("has_step_controller", &self.step_controller.is_some())
            .field("step_config", &self.step_config)
            .field("concurrency", &self.concurrency)
            .field("continue_on_error", &self.continue_on_error)
            .field("max_hops", &self.max_hops)
            .finish()
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn resolve_max_hops() -> u32 {
    dotenvy::dotenv().ok();
    std::env::var("WARPLINE_MAX_HOPS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_MAX_HOPS)
}
