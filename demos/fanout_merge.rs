//! Fan-out across three analysis branches and merge the results.
//!
//! ```sh
//! cargo run --example fanout_merge
//! ```

use async_trait::async_trait;
use serde_json::{Value, json};

use warpline::envelope::Envelope;
use warpline::node::{MergeCapable, Node, NodeContext, NodeError};
use warpline::graph::GraphBuilder;
use warpline::runtime::{RunOptions, Runtime};
use warpline::types::NodeKind;

struct Splitter;

#[async_trait]
impl Node for Splitter {
    fn id(&self) -> &str {
        "split"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Router
    }

    async fn run(&self, _ctx: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        Ok(envelope)
    }
}

struct Scorer {
    id: &'static str,
    delay_ms: u64,
    score: f64,
}

#[async_trait]
impl Node for Scorer {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    async fn run(&self, _ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        envelope.set_var(self.id, json!(self.score));
        Ok(envelope)
    }
}

struct AverageScores;

#[async_trait]
impl Node for AverageScores {
    fn id(&self) -> &str {
        "average"
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
impl MergeCapable for AverageScores {
    async fn merge_inputs(
        &self,
        ctx: NodeContext,
        inputs: Vec<Envelope>,
    ) -> Result<Envelope, NodeError> {
        ctx.emit(format!("averaging {} branch scores", inputs.len()))?;
        let scores: Vec<f64> = inputs
            .iter()
            .flat_map(|input| input.vars.values().filter_map(Value::as_f64))
            .collect();
        let average = scores.iter().sum::<f64>() / scores.len().max(1) as f64;

        let mut iter = inputs.into_iter();
        let mut merged = iter.next().expect("at least one input");
        for input in iter {
            for (key, value) in input.vars {
                merged.vars.entry(key).or_insert(value);
            }
        }
        merged.set_var("average", json!(average));
        Ok(merged)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    warpline::telemetry::init_tracing();

    let graph = GraphBuilder::new()
        .add_node(Splitter)
        .add_node(Scorer { id: "relevance", delay_ms: 30, score: 0.9 })
        .add_node(Scorer { id: "safety", delay_ms: 5, score: 0.7 })
        .add_node(Scorer { id: "style", delay_ms: 15, score: 0.8 })
        .add_node(AverageScores)
        .add_edge("split", "relevance")
        .add_edge("split", "safety")
        .add_edge("split", "style")
        .add_edge("relevance", "average")
        .add_edge("safety", "average")
        .add_edge("style", "average")
        .build()?;

    let runtime = Runtime::new(RunOptions::default());
    let final_envelope = runtime.run(&graph, Envelope::new(json!("draft"))).await?;

    println!("average score: {}", final_envelope.var("average").unwrap());
    Ok(())
}
