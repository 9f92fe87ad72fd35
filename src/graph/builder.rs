//! Fluent construction and build-time validation for pipeline graphs.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::{Graph, GraphError};
use crate::node::Node;

/// Builder assembling nodes and edges into a validated [`Graph`].
///
/// The builder is deliberately permissive while assembling (every method is
/// fluent and infallible) and strict at [`build`](Self::build), where all
/// structural invariants are checked in one place.
///
/// # Examples
///
/// ```
/// use warpline::graph::GraphBuilder;
/// # use async_trait::async_trait;
/// # use warpline::envelope::Envelope;
/// # use warpline::node::{Node, NodeContext, NodeError};
/// # use warpline::types::NodeKind;
/// # struct Probe(&'static str);
/// # #[async_trait]
/// # impl Node for Probe {
/// #     fn id(&self) -> &str { self.0 }
/// #     fn kind(&self) -> NodeKind { NodeKind::Transform }
/// #     async fn run(&self, _: NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
/// #         Ok(envelope)
/// #     }
/// # }
///
/// // Fan-out from "split" into two branches converging on "join".
/// let graph = GraphBuilder::new()
///     .add_node(Probe("split"))
///     .add_node(Probe("left"))
///     .add_node(Probe("right"))
///     .add_node(Probe("join"))
///     .add_edge("split", "left")
///     .add_edge("split", "right")
///     .add_edge("left", "join")
///     .add_edge("right", "join")
///     .build()
///     .unwrap();
///
/// // Entry inferred: "split" is the only node without incoming edges.
/// assert_eq!(graph.entry(), "split");
/// assert_eq!(graph.predecessors("join"), ["left", "right"]);
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: FxHashMap<String, Arc<dyn Node>>,
    insertion_order: Vec<String>,
    duplicates: Vec<String>,
    edges: Vec<(String, String)>,
    entry: Option<String>,
    entry_conflict: Option<(String, String)>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its own id.
    ///
    /// Adding the same id twice is recorded and rejected at build time.
    #[must_use]
    pub fn add_node(mut self, node: impl Node + 'static) -> Self {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            self.duplicates.push(id);
            return self;
        }
        self.insertion_order.push(id.clone());
        self.nodes.insert(id, Arc::new(node));
        self
    }

    /// Register an already-shared node.
    #[must_use]
    pub fn add_shared_node(mut self, node: Arc<dyn Node>) -> Self {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            self.duplicates.push(id);
            return self;
        }
        self.insertion_order.push(id.clone());
        self.nodes.insert(id, node);
        self
    }

    /// Add a directed edge. Declaration order is preserved and defines both
    /// fan-out branch order and the input order merge nodes observe.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Set the entry node. Setting it twice is rejected at build time.
    #[must_use]
    pub fn with_entry(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        match &self.entry {
            Some(existing) if *existing != id => {
                self.entry_conflict = Some((existing.clone(), id));
            }
            _ => self.entry = Some(id),
        }
        self
    }

    /// Validate and build the immutable graph.
    ///
    /// Checks, in order: non-empty, unique node ids, single entry, known
    /// entry, known edge endpoints, acyclicity.
    pub fn build(self) -> Result<Graph, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        if let Some(id) = self.duplicates.into_iter().next() {
            return Err(GraphError::DuplicateNode { id });
        }
        if let Some((first, second)) = self.entry_conflict {
            return Err(GraphError::EntrySetTwice { first, second });
        }

        let mut successors: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut predecessors: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for (from, to) in &self.edges {
            for endpoint in [from, to] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(GraphError::UnknownEdgeEndpoint {
                        from: from.clone(),
                        to: to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            successors.entry(from.clone()).or_default().push(to.clone());
            predecessors.entry(to.clone()).or_default().push(from.clone());
        }

        let entry = match self.entry {
            Some(id) => {
                if !self.nodes.contains_key(&id) {
                    return Err(GraphError::UnknownEntry { id });
                }
                id
            }
            None => infer_entry(&self.insertion_order, &predecessors)?,
        };

        detect_cycle(&self.insertion_order, &successors)?;

        let edge_count = self.edges.len();
        Ok(Graph::from_parts(
            self.nodes,
            successors,
            predecessors,
            entry,
            edge_count,
        ))
    }
}

/// Entry inference: the unique node with no incoming edges.
fn infer_entry(
    order: &[String],
    predecessors: &FxHashMap<String, Vec<String>>,
) -> Result<String, GraphError> {
    let mut roots = order
        .iter()
        .filter(|id| predecessors.get(*id).map(Vec::is_empty).unwrap_or(true));
    match (roots.next(), roots.next()) {
        (Some(root), None) => Ok(root.clone()),
        _ => Err(GraphError::MissingEntry),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// Iterative three-color DFS over every node; reports one offending path.
fn detect_cycle(
    order: &[String],
    successors: &FxHashMap<String, Vec<String>>,
) -> Result<(), GraphError> {
    let mut state: FxHashMap<&str, VisitState> = order
        .iter()
        .map(|id| (id.as_str(), VisitState::Unvisited))
        .collect();

    for root in order {
        if state[root.as_str()] != VisitState::Unvisited {
            continue;
        }
        // Stack frames: (node, next successor index to explore).
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        state.insert(root.as_str(), VisitState::InProgress);

        while let Some((node, next_index)) = stack.last().copied() {
            let outgoing = successors.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next_index >= outgoing.len() {
                state.insert(node, VisitState::Done);
                stack.pop();
                continue;
            }
            stack.last_mut().expect("frame present").1 += 1;
            let target = outgoing[next_index].as_str();
            match state[target] {
                VisitState::Unvisited => {
                    state.insert(target, VisitState::InProgress);
                    stack.push((target, 0));
                }
                VisitState::InProgress => {
                    let mut path: Vec<String> = stack
                        .iter()
                        .skip_while(|(id, _)| *id != target)
                        .map(|(id, _)| (*id).to_string())
                        .collect();
                    path.push(target.to_string());
                    return Err(GraphError::Cycle { path });
                }
                VisitState::Done => {}
            }
        }
    }
    Ok(())
}
