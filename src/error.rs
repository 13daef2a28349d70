use thiserror::Error;

/// Structural problems with a flow graph, detected before any node runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node id '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error(
        "Edge '{source_id}' -> '{target_id}' references node '{missing_node_id}', which does not exist"
    )]
    DanglingEdge {
        source_id: String,
        target_id: String,
        missing_node_id: String,
    },

    #[error("Flow contains a cycle: {}", cycle_path(.nodes))]
    Cycle { nodes: Vec<String> },

    #[error("Node '{node_id}' has an unregistered node type: '{type_name}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error("Node '{node_id}' expects {expected} input(s), but {found} edge(s) target it")]
    InputArity {
        node_id: String,
        expected: String,
        found: usize,
    },
}

fn cycle_path(nodes: &[String]) -> String {
    match nodes.first() {
        Some(first) => format!("{} -> {}", nodes.join(" -> "), first),
        None => String::new(),
    }
}

/// Errors raised by the node registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No transform is registered for node type '{0}'")]
    UnknownNodeType(String),
}

/// A node's configuration is missing, has unknown keys, or holds invalid values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Malformed '{node_type}' config: {message}")]
    Malformed { node_type: String, message: String },

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Errors from a dataset provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Dataset '{0}' was not found")]
    NotFound(String),

    #[error("Dataset name '{0}' is not allowed")]
    InvalidName(String),

    #[error("Could not read dataset '{name}': {message}")]
    Io { name: String, message: String },

    #[error("Invalid dataset schema file: {0}")]
    Schema(String),

    #[error("Dataset '{name}' has column '{column}', which its schema does not declare")]
    UndeclaredColumn { name: String, column: String },

    #[error("Dataset '{name}' line {line} is not a JSON object: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },
}

/// Errors raised by a node transform while running against its inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Column '{0}' not found in input")]
    MissingColumn(String),

    #[error("Column '{column}' holds non-numeric value '{found}', which '{operation}' cannot use")]
    NonNumeric {
        column: String,
        operation: String,
        found: String,
    },

    #[error("Column '{0}' would appear twice in the output")]
    DuplicateColumn(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("{0}")]
    Failed(String),
}

/// Errors that abort a whole execution request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Node '{node_id}' has an invalid configuration: {source}")]
    Config {
        node_id: String,
        #[source]
        source: ConfigError,
    },

    #[error("Node '{node_id}' failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: TransformError,
    },
}

impl ExecutionError {
    /// The node that failed, if the error is tied to one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionError::Graph(_) => None,
            ExecutionError::Config { node_id, .. } | ExecutionError::Node { node_id, .. } => {
                Some(node_id)
            }
        }
    }
}

/// Errors that can occur when converting a custom user format into a `FlowGraph`.
#[derive(Error, Debug, Clone)]
pub enum FlowConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),

    #[error("Failed to parse flow JSON: {0}")]
    JsonParseError(String),
}
