//! Drive a pipeline through the channel step controller, printing each
//! pause and injecting a variable mid-run.
//!
//! ```sh
//! cargo run --example step_debugger
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use warpline::envelope::Envelope;
use warpline::graph::GraphBuilder;
use warpline::node::{Node, NodeContext, NodeError};
use warpline::runtime::{RunOptions, Runtime, StepConfig};
use warpline::step::{ChannelStepController, EnvelopePatch, StepResponse};
use warpline::types::NodeKind;

struct Stage(&'static str);

#[async_trait]
impl Node for Stage {
    fn id(&self) -> &str {
        self.0
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    async fn run(&self, _ctx: NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        envelope.set_var(self.0, json!("done"));
        Ok(envelope)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    warpline::telemetry::init_tracing();

    let graph = GraphBuilder::new()
        .add_node(Stage("plan"))
        .add_node(Stage("draft"))
        .add_node(Stage("review"))
        .add_edge("plan", "draft")
        .add_edge("draft", "review")
        .build()?;

    let (controller, handle) = ChannelStepController::new(8);

    // The "debugger": print every pause, inject a variable before "draft".
    let debugger = tokio::spawn(async move {
        while let Ok(request) = handle.requests.recv_async().await {
            println!(
                "paused {} at {} (hop {}, vars: {})",
                request.node_id,
                request.point,
                request.hop,
                request.envelope.vars.len()
            );
            let mut response = StepResponse::proceed(&request.id);
            if request.node_id == "draft" {
                response = response
                    .with_patch(EnvelopePatch::default().set("reviewer_note", json!("be concise")));
            }
            if handle.responses.send_async(response).await.is_err() {
                break;
            }
        }
    });

    let runtime = Runtime::new(
        RunOptions::default()
            .with_step_controller(Arc::new(controller))
            .with_step_config(StepConfig {
                pause_before: true,
                pause_after: false,
                step_timeout: None,
            }),
    );

    let final_envelope = runtime.run(&graph, Envelope::new(json!("topic"))).await?;
    drop(runtime);
    debugger.await?;

    println!("reviewer_note: {}", final_envelope.var("reviewer_note").unwrap());
    Ok(())
}
