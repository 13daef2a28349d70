use super::definition::FlowGraph;
use crate::error::FlowConversionError;

/// A trait for custom flow documents that can be converted into a `FlowGraph`.
///
/// Flow editors rarely store graphs in exactly the shape the engine wants
/// (node types hidden inside UI payloads, handles named differently, ...).
/// Implementing this trait on your own document type keeps that translation
/// in one place.
///
/// # Example
///
/// ```rust,no_run
/// use nagare::prelude::*;
/// use nagare::error::FlowConversionError;
///
/// struct EditorNode { key: String, kind: String, settings: serde_json::Value }
/// struct EditorDocument { nodes: Vec<EditorNode>, links: Vec<(String, String)> }
///
/// impl IntoFlow for EditorDocument {
///     fn into_flow(self) -> std::result::Result<FlowGraph, FlowConversionError> {
///         Ok(FlowGraph {
///             nodes: self
///                 .nodes
///                 .into_iter()
///                 .map(|n| FlowNode::new(n.key, n.kind, n.settings))
///                 .collect(),
///             edges: self
///                 .links
///                 .into_iter()
///                 .map(|(from, to)| FlowEdge::new(from, to))
///                 .collect(),
///         })
///     }
/// }
/// ```
pub trait IntoFlow {
    /// Consumes the object and converts it into a flow graph.
    fn into_flow(self) -> Result<FlowGraph, FlowConversionError>;
}

impl IntoFlow for FlowGraph {
    fn into_flow(self) -> Result<FlowGraph, FlowConversionError> {
        Ok(self)
    }
}

impl IntoFlow for serde_json::Value {
    fn into_flow(self) -> Result<FlowGraph, FlowConversionError> {
        let graph = match self {
            serde_json::Value::Object(mut map) if map.contains_key("flow_graph") => map
                .remove("flow_graph")
                .unwrap_or(serde_json::Value::Null),
            other => other,
        };
        serde_json::from_value(graph)
            .map_err(|e| FlowConversionError::JsonParseError(e.to_string()))
    }
}

impl IntoFlow for &str {
    fn into_flow(self) -> Result<FlowGraph, FlowConversionError> {
        FlowGraph::from_json(self)
    }
}
