use super::FlowIndex;
use super::scheduler::{find_cycle, kahn};
use crate::error::GraphError;
use crate::flow::{FlowGraph, FlowNode};
use crate::registry::{NodeRegistry, NodeTransform};
use std::sync::Arc;

/// A flow graph that passed validation, together with its adjacency index and
/// the transform resolved for each node.
pub struct ValidatedFlow<'g> {
    graph: &'g FlowGraph,
    index: FlowIndex,
    transforms: Vec<Arc<dyn NodeTransform>>,
}

impl<'g> ValidatedFlow<'g> {
    pub fn graph(&self) -> &'g FlowGraph {
        self.graph
    }

    pub fn index(&self) -> &FlowIndex {
        &self.index
    }

    pub fn node(&self, position: usize) -> &'g FlowNode {
        &self.graph.nodes[position]
    }

    pub fn transform(&self, position: usize) -> &Arc<dyn NodeTransform> {
        &self.transforms[position]
    }
}

/// Checks a graph before anything runs:
/// duplicate ids, dangling edges, cycles, unknown node types and input arity,
/// in that order. The first failure is returned.
pub fn validate<'g>(
    graph: &'g FlowGraph,
    registry: &NodeRegistry,
) -> Result<ValidatedFlow<'g>, GraphError> {
    let index = FlowIndex::build(graph)?;

    let kahn = kahn(&index);
    if !kahn.blocked.is_empty() {
        return Err(GraphError::Cycle {
            nodes: find_cycle(&index, &kahn.blocked),
        });
    }

    let transforms = graph
        .nodes
        .iter()
        .map(|node| {
            registry
                .lookup(&node.node_type)
                .map_err(|_| GraphError::UnknownNodeType {
                    node_id: node.id.clone(),
                    type_name: node.node_type.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (position, transform) in transforms.iter().enumerate() {
        let arity = transform.arity();
        let found = index.predecessors(position).len();
        if !arity.accepts(found) {
            return Err(GraphError::InputArity {
                node_id: index.id(position).to_string(),
                expected: arity.to_string(),
                found,
            });
        }
    }

    Ok(ValidatedFlow {
        graph,
        index,
        transforms,
    })
}
