//! Property tests: traversal determinism under arbitrary branch timing.

mod common;

use proptest::prelude::*;
use serde_json::{Value, json};

use warpline::envelope::Envelope;
use warpline::graph::{Graph, GraphBuilder};
use warpline::runtime::Runtime;

use common::*;

const BRANCH_IDS: [&str; 5] = ["b0", "b1", "b2", "b3", "b4"];

fn fanout_graph(branch_count: usize, delays_ms: &[u64]) -> Graph {
    let mut builder = GraphBuilder::new().add_node(TagNode::new("split"));
    for (index, &id) in BRANCH_IDS.iter().take(branch_count).enumerate() {
        let delay = std::time::Duration::from_millis(delays_ms[index % delays_ms.len()]);
        builder = builder
            .add_node(TagNode::new(id).with_delay(delay))
            .add_edge("split", id)
            .add_edge(id, "join");
    }
    builder
        .add_node(UnionMerge::new("join"))
        .build()
        .expect("valid fan-out graph")
}

fn run_blocking(graph: &Graph) -> Envelope {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .expect("tokio runtime");
    runtime
        .block_on(Runtime::with_defaults().run(graph, Envelope::default()))
        .expect("run succeeds")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Merge input order is the branch declaration order no matter which
    /// branch finishes first.
    #[test]
    fn merge_order_is_independent_of_completion_order(
        branch_count in 2usize..=5,
        delays in prop::collection::vec(0u64..20, 1..=5),
    ) {
        let graph = fanout_graph(branch_count, &delays);
        let final_envelope = run_blocking(&graph);

        let expected: Vec<Value> = BRANCH_IDS
            .iter()
            .take(branch_count)
            .map(|id| json!(id))
            .collect();
        prop_assert_eq!(
            final_envelope.var("branch_order"),
            Some(&Value::Array(expected))
        );
    }

    /// A linear chain applies node writes in traversal order regardless of
    /// chain length.
    #[test]
    fn linear_trail_matches_chain_order(length in 1usize..=5) {
        let mut builder = GraphBuilder::new();
        for index in 0..length {
            builder = builder.add_node(TagNode::new(BRANCH_IDS[index]));
            if index > 0 {
                builder = builder.add_edge(BRANCH_IDS[index - 1], BRANCH_IDS[index]);
            }
        }
        let graph = builder.build().expect("valid chain");
        let final_envelope = run_blocking(&graph);

        let trail: Vec<Value> = BRANCH_IDS
            .iter()
            .take(length)
            .map(|id| json!(id))
            .collect();
        prop_assert_eq!(final_envelope.var("trail"), Some(&Value::Array(trail)));
    }
}
