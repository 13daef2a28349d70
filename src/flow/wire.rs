//! Request and streaming shapes exchanged with flow editors.

use super::definition::FlowGraph;
use serde::{Deserialize, Serialize};

/// The request body of an execution call: `{"flow_graph": {nodes, edges}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
    pub flow_graph: FlowGraph,
}

impl From<FlowGraph> for FlowRequest {
    fn from(flow_graph: FlowGraph) -> Self {
        Self { flow_graph }
    }
}

/// One NDJSON line of a streamed execution: a node and its output.
#[derive(Debug, Clone, Serialize)]
pub struct StepLine<'a, T: Serialize> {
    pub node_id: &'a str,
    pub output: &'a T,
}

/// One NDJSON line of an allowed-fields response.
#[derive(Debug, Clone, Serialize)]
pub struct AllowedFieldsLine<'a, T: Serialize> {
    pub node_id: &'a str,
    pub allowed_fields: &'a T,
}
