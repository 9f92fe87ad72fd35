//! Event model, emitter contracts, and the sink-fanning event bus.
//!
//! The module is organised around the structured [`Event`] record, the
//! [`EventEmitter`] contract (with the engine's sequencing [`RunEmitter`]),
//! and an [`EventBus`] that forwards every published event to pluggable
//! [`EventSink`]s without ever blocking graph execution.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod sink;

pub use bus::{DEFAULT_BUFFER_CAPACITY, EventBus};
pub use emitter::{
    EmitterDecorator, EmitterError, EventEmitter, EventHandler, NowFn, RunEmitter, TraceEmitter,
};
pub use event::{Event, EventKind, TraceContext};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
