use crate::error::FlowConversionError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// The complete definition of a flow: typed nodes plus the edges between them.
///
/// A graph is immutable for the duration of one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

/// One typed processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Node-type specific options. Always a JSON object; `null` or a missing
    /// key reads as an empty object.
    #[serde(default = "empty_config", deserialize_with = "deserialize_config")]
    pub config: JsonValue,
}

/// A data dependency from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    #[serde(
        default,
        alias = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
    /// Input slot on the target, written as `input-N`.
    #[serde(
        default,
        alias = "targetHandle",
        deserialize_with = "deserialize_target_handle",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_handle: Option<String>,
}

fn empty_config() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

fn deserialize_config<'de, D: Deserializer<'de>>(deserializer: D) -> Result<JsonValue, D::Error> {
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(empty_config()),
        Some(value @ JsonValue::Object(_)) => Ok(value),
        Some(other) => Err(serde::de::Error::custom(format!(
            "node config must be an object, found {}",
            other
        ))),
    }
}

fn deserialize_target_handle<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(handle) if parse_handle_index(&handle).is_none() => {
            Err(serde::de::Error::custom(format!(
                "target handle '{}' does not name an input slot (expected 'input-N')",
                handle
            )))
        }
        handle => Ok(handle),
    }
}

impl FlowNode {
    /// Creates a node. A non-object `config` is replaced by an empty object.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: JsonValue) -> Self {
        let config = if config.is_object() {
            config
        } else {
            empty_config()
        };
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config,
        }
    }
}

impl FlowEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Creates an edge feeding a specific input slot of the target.
    pub fn with_slot(source: impl Into<String>, target: impl Into<String>, slot: u32) -> Self {
        Self {
            target_handle: Some(format!("input-{}", slot)),
            ..Self::new(source, target)
        }
    }

    /// The target input slot; edges without a handle feed slot 0.
    pub fn slot(&self) -> u32 {
        let Some(handle) = self.target_handle.as_deref() else {
            return 0;
        };
        parse_handle_index(handle).unwrap_or_else(|| {
            log::warn!(
                "Edge '{}' -> '{}' has malformed target handle '{}'; using slot 0",
                self.source,
                self.target,
                handle
            );
            0
        })
    }
}

fn parse_handle_index(handle: &str) -> Option<u32> {
    handle.rsplit('-').next()?.parse().ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlowPayload {
    Envelope { flow_graph: FlowGraph },
    Bare(FlowGraph),
}

impl FlowGraph {
    /// Parses either a bare `{nodes, edges}` object or a request envelope
    /// `{"flow_graph": {nodes, edges}}`.
    pub fn from_json(json: &str) -> Result<Self, FlowConversionError> {
        let payload: FlowPayload = serde_json::from_str(json)
            .map_err(|e| FlowConversionError::JsonParseError(e.to_string()))?;
        Ok(match payload {
            FlowPayload::Envelope { flow_graph } => flow_graph,
            FlowPayload::Bare(graph) => graph,
        })
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
