//! # Warpline: Graph Execution Runtime for Agent Pipelines
//!
//! Warpline executes directed acyclic graphs of pipeline nodes (LLM calls,
//! tool invocations, routers, transforms) by flowing a single data carrier,
//! the [`Envelope`](envelope::Envelope), through them. The engine walks the
//! graph, fans envelopes out across parallel branches, joins them back
//! through synchronized merge barriers, applies per-node error policy, emits
//! an ordered event stream, and exposes a step-through debugging protocol
//! that can pause, inspect, mutate, skip, or abort live execution.
//!
//! ## Core Concepts
//!
//! - **Envelope**: the mutable carrier of input, variables, messages,
//!   artifacts, and failures
//! - **Graph**: an immutable-after-build DAG of nodes, validated at build
//!   time
//! - **Node**: the capability every executable unit implements
//! - **Merge**: the fan-in extension that waits for N parallel inputs
//! - **Events**: sequenced, timestamped records of everything that happened
//! - **Step protocol**: pause points with pluggable controllers
//!
//! ## Quick Start
//!
//! ```
//! use async_trait::async_trait;
//! use serde_json::json;
//! use warpline::envelope::Envelope;
//! use warpline::graph::GraphBuilder;
//! use warpline::node::{Node, NodeContext, NodeError};
//! use warpline::runtime::{RunOptions, Runtime};
//! use warpline::types::NodeKind;
//!
//! struct Uppercase;
//!
//! #[async_trait]
//! impl Node for Uppercase {
//!     fn id(&self) -> &str {
//!         "uppercase"
//!     }
//!
//!     fn kind(&self) -> NodeKind {
//!         NodeKind::Transform
//!     }
//!
//!     async fn run(&self, _ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
//!         let text = envelope.input.as_str().unwrap_or_default().to_uppercase();
//!         envelope.set_var("shouted", json!(text));
//!         Ok(envelope)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphBuilder::new().add_node(Uppercase).build()?;
//! let runtime = Runtime::new(RunOptions::default());
//! let final_envelope = runtime.run(&graph, Envelope::new(json!("hello"))).await?;
//! assert_eq!(final_envelope.var("shouted"), Some(&json!("HELLO")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`envelope`] - The data carrier and its builder
//! - [`graph`] - Graph definition and build-time validation
//! - [`node`] - Node and merge capabilities, error policy
//! - [`runtime`] - The execution engine and run options
//! - [`step`] - Step-through debugging protocol and controllers
//! - [`event_bus`] - Event model, emitters, bus, and sinks
//! - [`errors`] - Structured failure records carried on envelopes
//! - [`telemetry`] - Event formatting and tracing setup

pub mod envelope;
pub mod errors;
pub mod event_bus;
pub mod graph;
pub mod message;
pub mod node;
pub mod runtime;
pub mod step;
pub mod telemetry;
pub mod types;
pub mod utils;
