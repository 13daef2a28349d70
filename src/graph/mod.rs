//! Structural view of a flow graph: adjacency, validation and scheduling.

use crate::error::GraphError;
use crate::flow::FlowGraph;
use ahash::AHashMap;

pub mod scheduler;
pub mod validator;

pub use scheduler::order;
pub use validator::{ValidatedFlow, validate};

/// Index-based adjacency of a flow graph, built once per request.
///
/// Nodes are addressed by their position in `FlowGraph::nodes`. Predecessor
/// lists are ordered by target slot, then by edge declaration order, which is
/// the order inputs reach a transform.
#[derive(Debug, Clone)]
pub struct FlowIndex {
    ids: Vec<String>,
    positions: AHashMap<String, usize>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
}

impl FlowIndex {
    /// Indexes the graph, rejecting duplicate node ids and dangling edges.
    pub fn build(graph: &FlowGraph) -> Result<Self, GraphError> {
        let mut positions = AHashMap::with_capacity(graph.nodes.len());
        for (position, node) in graph.nodes.iter().enumerate() {
            if positions.insert(node.id.clone(), position).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        let mut incoming: Vec<Vec<(u32, usize, usize)>> = vec![Vec::new(); graph.nodes.len()];
        let mut successors = vec![Vec::new(); graph.nodes.len()];
        for (edge_index, edge) in graph.edges.iter().enumerate() {
            let resolve = |id: &str| {
                positions
                    .get(id)
                    .copied()
                    .ok_or_else(|| GraphError::DanglingEdge {
                        source_id: edge.source.clone(),
                        target_id: edge.target.clone(),
                        missing_node_id: id.to_string(),
                    })
            };
            let source = resolve(&edge.source)?;
            let target = resolve(&edge.target)?;
            incoming[target].push((edge.slot(), edge_index, source));
            successors[source].push(target);
        }

        let predecessors = incoming
            .into_iter()
            .map(|mut edges| {
                edges.sort_unstable_by_key(|&(slot, edge_index, _)| (slot, edge_index));
                edges.into_iter().map(|(_, _, source)| source).collect()
            })
            .collect();

        Ok(Self {
            ids: graph.nodes.iter().map(|n| n.id.clone()).collect(),
            positions,
            predecessors,
            successors,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> &str {
        &self.ids[position]
    }

    /// One entry per incoming edge, in input order.
    pub fn predecessors(&self, position: usize) -> &[usize] {
        &self.predecessors[position]
    }

    /// One entry per outgoing edge, in edge declaration order.
    pub fn successors(&self, position: usize) -> &[usize] {
        &self.successors[position]
    }
}
