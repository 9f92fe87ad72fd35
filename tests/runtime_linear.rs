//! Single-path traversal semantics: deterministic order, hop accounting,
//! and the runaway-graph guard.

mod common;

use serde_json::json;

use warpline::envelope::Envelope;
use warpline::graph::GraphBuilder;
use warpline::runtime::{RunOptions, Runtime, RuntimeError};

use common::*;

#[tokio::test]
async fn vars_accumulate_in_traversal_order() {
    let graph = linear_graph();
    let runtime = Runtime::with_defaults();

    let final_envelope = runtime
        .run(&graph, envelope_with_input("go"))
        .await
        .unwrap();

    assert_trail(&final_envelope, &["a", "b", "c"]);
    assert_var_eq(&final_envelope, "a", json!(true));
    assert_var_eq(&final_envelope, "b", json!(true));
    assert_var_eq(&final_envelope, "c", json!(true));
}

#[tokio::test]
async fn each_node_runs_exactly_once() {
    let a = TagNode::new("a");
    let b = TagNode::new("b");
    let runs_a = a.run_counter();
    let runs_b = b.run_counter();
    let graph = GraphBuilder::new()
        .add_node(a)
        .add_node(b)
        .add_edge("a", "b")
        .build()
        .unwrap();

    Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();

    assert_eq!(runs_a.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(runs_b.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hop_count_tracks_nodes_visited() {
    let graph = linear_graph();
    let final_envelope = Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();
    assert_eq!(final_envelope.trace.hops, 3);
}

#[tokio::test]
async fn exceeding_max_hops_is_fatal() {
    let graph = linear_graph();
    let runtime = Runtime::new(RunOptions::default().with_max_hops(2));

    let result = runtime.run(&graph, Envelope::default()).await;

    match result {
        Err(RuntimeError::MaxHopsExceeded { limit, node_id }) => {
            assert_eq!(limit, 2);
            assert_eq!(node_id, "c");
        }
        other => panic!("expected max-hops error, got {other:?}"),
    }
}

#[tokio::test]
async fn run_preserves_input_and_messages() {
    let graph = linear_graph();
    let envelope = Envelope::builder()
        .with_input(json!({"task": "demo"}))
        .with_user_message("kick off")
        .build();

    let final_envelope = Runtime::with_defaults().run(&graph, envelope).await.unwrap();

    assert_eq!(final_envelope.input, json!({"task": "demo"}));
    // Initial user message plus one assistant message per node.
    assert_eq!(final_envelope.messages.len(), 4);
    assert_eq!(final_envelope.messages[0].content, "kick off");
}

#[tokio::test]
async fn single_node_graph_runs() {
    let graph = GraphBuilder::new().add_node(TagNode::new("solo")).build().unwrap();
    let final_envelope = Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();
    assert_var_eq(&final_envelope, "solo", json!(true));
    assert_eq!(final_envelope.trace.hops, 1);
}
