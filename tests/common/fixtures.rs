#![allow(dead_code)]

use serde_json::json;

use warpline::envelope::Envelope;
use warpline::graph::{Graph, GraphBuilder};

use super::nodes::{TagNode, UnionMerge};

/// Fresh envelope with a JSON string input.
pub fn envelope_with_input(text: &str) -> Envelope {
    Envelope::new(json!(text))
}

/// `a -> b -> c` linear chain of tag nodes.
pub fn linear_graph() -> Graph {
    GraphBuilder::new()
        .add_node(TagNode::new("a"))
        .add_node(TagNode::new("b"))
        .add_node(TagNode::new("c"))
        .add_edge("a", "b")
        .add_edge("b", "c")
        .build()
        .expect("valid linear graph")
}

/// `split -> {left, right} -> join -> final` diamond. Branch delays let
/// tests invert completion order without touching topology.
pub fn diamond_graph(left_delay_ms: u64, right_delay_ms: u64) -> Graph {
    GraphBuilder::new()
        .add_node(TagNode::new("split"))
        .add_node(TagNode::new("left").with_delay(std::time::Duration::from_millis(left_delay_ms)))
        .add_node(
            TagNode::new("right").with_delay(std::time::Duration::from_millis(right_delay_ms)),
        )
        .add_node(UnionMerge::new("join"))
        .add_node(TagNode::new("final"))
        .add_edge("split", "left")
        .add_edge("split", "right")
        .add_edge("left", "join")
        .add_edge("right", "join")
        .add_edge("join", "final")
        .build()
        .expect("valid diamond graph")
}
