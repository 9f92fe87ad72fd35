//! Fan-out/fan-in semantics: clone isolation, barrier synchronization,
//! declaration-order merges, and merge edge cases.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::{Value, json};

use warpline::envelope::Envelope;
use warpline::graph::GraphBuilder;
use warpline::runtime::{RunOptions, Runtime, RuntimeError};

use common::*;

#[tokio::test]
async fn diamond_merges_in_declaration_order() {
    let graph = diamond_graph(0, 0);
    let final_envelope = Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();

    assert_var_eq(
        &final_envelope,
        "branch_order",
        Value::Array(vec![json!("left"), json!("right")]),
    );
    assert_var_eq(&final_envelope, "left", json!(true));
    assert_var_eq(&final_envelope, "right", json!(true));
    assert_var_eq(&final_envelope, "final", json!(true));
}

#[tokio::test]
async fn completion_order_does_not_affect_merge_order() {
    // Left branch finishes long after right; collected order must not move.
    let slow_left = diamond_graph(40, 0);
    let slow_right = diamond_graph(0, 40);

    let left_result = Runtime::with_defaults()
        .run(&slow_left, Envelope::default())
        .await
        .unwrap();
    let right_result = Runtime::with_defaults()
        .run(&slow_right, Envelope::default())
        .await
        .unwrap();

    let expected = Value::Array(vec![json!("left"), json!("right")]);
    assert_var_eq(&left_result, "branch_order", expected.clone());
    assert_var_eq(&right_result, "branch_order", expected);
}

#[tokio::test]
async fn merge_strategy_runs_exactly_once() {
    let merge = UnionMerge::new("join");
    let invocations = merge.invocation_counter();
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("split"))
        .add_node(TagNode::new("left"))
        .add_node(TagNode::new("right"))
        .add_node(merge)
        .add_edge("split", "left")
        .add_edge("split", "right")
        .add_edge("left", "join")
        .add_edge("right", "join")
        .build()
        .unwrap();

    Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sibling_branches_cannot_observe_each_other() {
    let left = CaptureNode::new("left").with_delay(Duration::from_millis(30));
    let right = CaptureNode::new("right");
    let left_seen = left.observations();
    let right_seen = right.observations();

    let graph = GraphBuilder::new()
        .add_node(TagNode::new("split"))
        .add_node(left)
        .add_node(right)
        .add_node(UnionMerge::new("join"))
        .add_edge("split", "left")
        .add_edge("split", "right")
        .add_edge("left", "join")
        .add_edge("right", "join")
        .build()
        .unwrap();

    Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();

    // Right finished before left even started its delay; left must still not
    // see right's mutation (and vice versa).
    let left_vars = left_seen.lock().unwrap()[0].clone();
    let right_vars = right_seen.lock().unwrap()[0].clone();
    assert!(!left_vars.contains(&"right".to_string()), "{left_vars:?}");
    assert!(!right_vars.contains(&"left".to_string()), "{right_vars:?}");
}

#[tokio::test]
async fn single_input_merge_passes_through_without_strategy() {
    let merge = UnionMerge::new("join");
    let invocations = merge.invocation_counter();
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(merge)
        .add_node(TagNode::new("b"))
        .add_edge("a", "join")
        .add_edge("join", "b")
        .build()
        .unwrap();

    let final_envelope = Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    assert_var_eq(&final_envelope, "a", json!(true));
    assert_var_eq(&final_envelope, "b", json!(true));
    assert_var_absent(&final_envelope, "branch_order");
}

#[tokio::test]
async fn three_way_fanout_merges_all_branches() {
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("split"))
        .add_node(TagNode::new("b1"))
        .add_node(TagNode::new("b2").with_delay(Duration::from_millis(20)))
        .add_node(TagNode::new("b3"))
        .add_node(UnionMerge::new("join"))
        .add_edge("split", "b1")
        .add_edge("split", "b2")
        .add_edge("split", "b3")
        .add_edge("b1", "join")
        .add_edge("b2", "join")
        .add_edge("b3", "join")
        .build()
        .unwrap();

    let final_envelope = Runtime::with_defaults()
        .run(&graph, Envelope::default())
        .await
        .unwrap();

    assert_var_eq(
        &final_envelope,
        "branch_order",
        Value::Array(vec![json!("b1"), json!("b2"), json!("b3")]),
    );
}

#[tokio::test]
async fn merge_failure_is_fatal() {
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("split"))
        .add_node(TagNode::new("left"))
        .add_node(TagNode::new("right"))
        .add_node(FailingMerge { id: "join" })
        .add_edge("split", "left")
        .add_edge("split", "right")
        .add_edge("left", "join")
        .add_edge("right", "join")
        .build()
        .unwrap();

    let result = Runtime::with_defaults().run(&graph, Envelope::default()).await;

    match result {
        Err(RuntimeError::Merge { id, .. }) => assert_eq!(id, "join"),
        other => panic!("expected merge error, got {other:?}"),
    }
}

#[tokio::test]
async fn underfed_merge_stalls_the_run() {
    // The merge expects three inputs but only two branches feed it.
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("split"))
        .add_node(TagNode::new("left"))
        .add_node(TagNode::new("right"))
        .add_node(UnionMerge::new("join").with_expected(3))
        .add_edge("split", "left")
        .add_edge("split", "right")
        .add_edge("left", "join")
        .add_edge("right", "join")
        .build()
        .unwrap();

    let result = Runtime::with_defaults().run(&graph, Envelope::default()).await;
    assert!(matches!(result, Err(RuntimeError::Stalled { .. })));
}

#[tokio::test]
async fn concurrency_cap_of_one_still_completes_fanout() {
    let graph = diamond_graph(5, 5);
    let runtime = Runtime::new(RunOptions::default().with_concurrency(1));

    let final_envelope = runtime.run(&graph, Envelope::default()).await.unwrap();

    assert_var_eq(
        &final_envelope,
        "branch_order",
        Value::Array(vec![json!("left"), json!("right")]),
    );
}
