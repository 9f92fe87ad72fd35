//! Build-time validation of pipeline graphs.

mod common;

use warpline::graph::{GraphBuilder, GraphError};

use common::*;

#[test]
fn empty_graph_is_rejected() {
    let result = GraphBuilder::new().build();
    assert!(matches!(result, Err(GraphError::Empty)));
}

#[test]
fn duplicate_node_is_rejected() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("a"))
        .build();
    match result {
        Err(GraphError::DuplicateNode { id }) => assert_eq!(id, "a"),
        other => panic!("expected duplicate-node error, got {other:?}"),
    }
}

#[test]
fn unknown_edge_endpoint_is_rejected() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_edge("a", "ghost")
        .build();
    match result {
        Err(GraphError::UnknownEdgeEndpoint { from, to, missing }) => {
            assert_eq!(from, "a");
            assert_eq!(to, "ghost");
            assert_eq!(missing, "ghost");
        }
        other => panic!("expected unknown-endpoint error, got {other:?}"),
    }
}

#[test]
fn entry_is_inferred_from_unique_root() {
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("b"))
        .add_edge("a", "b")
        .build()
        .unwrap();
    assert_eq!(graph.entry(), "a");
}

#[test]
fn ambiguous_roots_without_explicit_entry_are_rejected() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("b"))
        .build();
    assert!(matches!(result, Err(GraphError::MissingEntry)));
}

#[test]
fn explicit_entry_wins_over_inference() {
    // "b" has an incoming edge but is still a legal explicit entry.
    let graph = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("b"))
        .add_edge("a", "b")
        .with_entry("b")
        .build()
        .unwrap();
    assert_eq!(graph.entry(), "b");
}

#[test]
fn conflicting_entries_are_rejected() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("b"))
        .add_edge("a", "b")
        .with_entry("a")
        .with_entry("b")
        .build();
    match result {
        Err(GraphError::EntrySetTwice { first, second }) => {
            assert_eq!(first, "a");
            assert_eq!(second, "b");
        }
        other => panic!("expected entry-set-twice error, got {other:?}"),
    }
}

#[test]
fn unknown_entry_is_rejected() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .with_entry("ghost")
        .build();
    assert!(matches!(result, Err(GraphError::UnknownEntry { .. })));
}

#[test]
fn cycle_is_rejected_with_path() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("b"))
        .add_node(TagNode::new("c"))
        .add_edge("a", "b")
        .add_edge("b", "c")
        .add_edge("c", "a")
        .with_entry("a")
        .build();
    match result {
        Err(GraphError::Cycle { path }) => {
            assert!(path.len() >= 2, "cycle path too short: {path:?}");
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn self_loop_is_rejected() {
    let result = GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_edge("a", "a")
        .with_entry("a")
        .build();
    assert!(matches!(result, Err(GraphError::Cycle { .. })));
}

#[test]
fn predecessors_preserve_declaration_order() {
    let graph = diamond_graph(0, 0);
    assert_eq!(graph.predecessors("join"), ["left", "right"]);
    assert_eq!(graph.successors("split"), ["left", "right"]);
    assert_eq!(graph.edge_count(), 5);
    assert_eq!(graph.node_count(), 5);
}
