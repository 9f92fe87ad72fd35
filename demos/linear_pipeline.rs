//! Minimal linear pipeline with live event streaming to stdout.
//!
//! ```sh
//! cargo run --example linear_pipeline
//! ```

use async_trait::async_trait;
use serde_json::json;

use warpline::envelope::Envelope;
use warpline::event_bus::{EventBus, StdOutSink};
use warpline::graph::GraphBuilder;
use warpline::node::{Node, NodeContext, NodeError};
use warpline::runtime::{RunOptions, Runtime};
use warpline::types::NodeKind;

struct Fetch;

#[async_trait]
impl Node for Fetch {
    fn id(&self) -> &str {
        "fetch"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Tool
    }

    async fn run(&self, ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        ctx.emit("pretending to fetch a document")?;
        envelope.set_var("document", json!("warpline executes agent pipelines"));
        Ok(envelope)
    }
}

struct Summarize;

#[async_trait]
impl Node for Summarize {
    fn id(&self) -> &str {
        "summarize"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    async fn run(&self, _ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        let document = envelope
            .var("document")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let summary: String = document.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
        envelope.set_var("summary", json!(summary));
        Ok(envelope)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    warpline::telemetry::init_tracing();

    let graph = GraphBuilder::new()
        .add_node(Fetch)
        .add_node(Summarize)
        .add_edge("fetch", "summarize")
        .build()?;

    let bus = EventBus::with_sink(StdOutSink::default());
    let runtime = Runtime::new(RunOptions::default().with_event_bus(bus.clone()));

    let final_envelope = runtime
        .run(&graph, Envelope::new(json!("summarize the docs")))
        .await?;

    // Give the bus listener a beat to flush before printing the result.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    bus.stop_listener().await;

    println!("summary: {}", final_envelope.var("summary").unwrap());
    Ok(())
}
