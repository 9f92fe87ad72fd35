//! Emitter contracts and the run-scoped sequencing emitter.
//!
//! [`EventEmitter`] is the function contract nodes and the engine share for
//! surfacing events. [`RunEmitter`] is the engine-side implementation: it
//! assigns the per-run sequence number, stamps the timestamp from the
//! configured clock, invokes the synchronous handler, and forwards to the
//! event bus. Assignment and dispatch happen under one lock so any single
//! subscriber observes strictly increasing sequence numbers.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use chrono::{DateTime, Utc};

use super::bus::EventBus;
use super::event::{Event, TraceContext};

/// Synchronous event handler invoked inline at emission.
pub type EventHandler = std::sync::Arc<dyn Fn(&Event) + Send + Sync>;

/// Function that wraps an emitter, e.g. to attach trace context.
pub type EmitterDecorator = std::sync::Arc<
    dyn Fn(std::sync::Arc<dyn EventEmitter>) -> std::sync::Arc<dyn EventEmitter> + Send + Sync,
>;

/// Injectable clock for deterministic timestamps in tests.
pub type NowFn = std::sync::Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Abstract event emitter that engine internals and nodes can share.
pub trait EventEmitter: Send + Sync + fmt::Debug {
    /// Emit an event synchronously without blocking graph execution.
    fn emit(&self, event: Event) -> Result<(), EmitterError>;
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event bus closed")]
    Closed,
    #[error("event emission failed: {0}")]
    Other(String),
}

impl EmitterError {
    pub fn other(error: impl Into<String>) -> Self {
        Self::Other(error.into())
    }
}

/// Engine-side emitter: sequences, timestamps, and dispatches events for one
/// run.
pub struct RunEmitter {
    seq: AtomicU64,
    dispatch: Mutex<()>,
    handler: Option<EventHandler>,
    bus: Option<EventBus>,
    now: Option<NowFn>,
}

impl fmt::Debug for RunEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunEmitter")
            .field("seq", &self.seq.load(Ordering::Relaxed))
            .field("has_handler", &self.handler.is_some())
            .field("has_bus", &self.bus.is_some())
            .finish()
    }
}

impl RunEmitter {
    #[must_use]
    pub fn new(handler: Option<EventHandler>, bus: Option<EventBus>, now: Option<NowFn>) -> Self {
        Self {
            seq: AtomicU64::new(0),
            dispatch: Mutex::new(()),
            handler,
            bus,
            now,
        }
    }

    /// Last sequence number handed out, or 0 if nothing was emitted yet.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn now(&self) -> DateTime<Utc> {
        match &self.now {
            Some(clock) => clock(),
            None => Utc::now(),
        }
    }
}

impl EventEmitter for RunEmitter {
    fn emit(&self, mut event: Event) -> Result<(), EmitterError> {
        // Sequence assignment and delivery share one critical section so a
        // subscriber never observes seq N after N+1.
        let guard = self
            .dispatch
            .lock()
            .map_err(|_| EmitterError::other("emitter lock poisoned"))?;
        event.seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        event.timestamp = self.now();

        if let Some(handler) = &self.handler {
            handler(&event);
        }
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
        drop(guard);
        Ok(())
    }
}

/// Stock emitter decorator that stamps trace identifiers onto every event
/// passing through it.
///
/// ```
/// use std::sync::Arc;
/// use warpline::event_bus::{EventEmitter, RunEmitter, TraceEmitter};
///
/// let inner: Arc<dyn EventEmitter> = Arc::new(RunEmitter::new(None, None, None));
/// let traced = TraceEmitter::new(inner, "run-1", "span-a");
/// ```
#[derive(Debug)]
pub struct TraceEmitter {
    inner: std::sync::Arc<dyn EventEmitter>,
    run_id: String,
    span_id: String,
}

impl TraceEmitter {
    #[must_use]
    pub fn new(
        inner: std::sync::Arc<dyn EventEmitter>,
        run_id: impl Into<String>,
        span_id: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            run_id: run_id.into(),
            span_id: span_id.into(),
        }
    }
}

impl EventEmitter for TraceEmitter {
    fn emit(&self, mut event: Event) -> Result<(), EmitterError> {
        if event.trace.is_none() {
            event.trace = Some(TraceContext {
                run_id: self.run_id.clone(),
                span_id: self.span_id.clone(),
            });
        }
        self.inner.emit(event)
    }
}
