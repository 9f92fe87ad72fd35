//! The execution runtime: traversal, branch concurrency, merge barriers,
//! error policy, event emission, and step-point interception.
//!
//! The central type is [`Runtime`]; configure one with [`RunOptions`] and
//! call [`Runtime::run`] per pipeline execution. Each run is independent:
//! the engine performs no cross-run scheduling and no persistence of its
//! own (persistence is delegated to event-bus sinks).

mod engine;
mod error;
mod merge;
mod options;

pub use engine::Runtime;
pub use error::RuntimeError;
pub use options::{DEFAULT_MAX_HOPS, RunOptions, StepConfig};
