use super::definition::FlowGraph;
use crate::error::FlowConversionError;
use ahash::RandomState;
use bincode::config::standard;
use bincode::serde::encode_to_vec;

// Fixed seeds keep fingerprints reproducible across processes of one build.
const SEEDS: [u64; 4] = [
    0x6e61_6761_7265_0001,
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
];

impl FlowGraph {
    /// A content hash of the graph, for callers that cache execution results.
    ///
    /// The graph is encoded with bincode and hashed with fixed-seed ahash, so
    /// two graphs with the same nodes, configs and edges (in the same order)
    /// share a fingerprint.
    pub fn fingerprint(&self) -> Result<u64, FlowConversionError> {
        let bytes = encode_to_vec(self, standard())
            .map_err(|e| FlowConversionError::ValidationError(format!("Encoding failed: {}", e)))?;
        let state = RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]);
        Ok(state.hash_one(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use crate::flow::{FlowEdge, FlowGraph, FlowNode};
    use serde_json::json;

    fn graph(threshold: i64) -> FlowGraph {
        FlowGraph {
            nodes: vec![
                FlowNode::new("src", "datasource", json!({"input": [{"a": 1}]})),
                FlowNode::new(
                    "f",
                    "filter",
                    json!({"rules": [{"field": "a", "condition": "gt", "value": threshold}]}),
                ),
            ],
            edges: vec![FlowEdge::new("src", "f")],
        }
    }

    #[test]
    fn equal_graphs_share_a_fingerprint() {
        assert_eq!(
            graph(1).fingerprint().unwrap(),
            graph(1).fingerprint().unwrap()
        );
    }

    #[test]
    fn config_changes_change_the_fingerprint() {
        assert_ne!(
            graph(1).fingerprint().unwrap(),
            graph(2).fingerprint().unwrap()
        );
    }
}
