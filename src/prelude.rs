//! Prelude module for convenient imports
//!
//! Re-exports the types most callers need to build, validate and execute a
//! flow graph.
//!
//! # Example
//!
//! ```rust,no_run
//! use nagare::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let flow_json = std::fs::read_to_string("path/to/flow.json")?;
//! let graph = FlowGraph::from_json(&flow_json)?;
//!
//! let engine = FlowEngine::default();
//! let columns = engine.execute_metadata(&graph)?;
//! for (node_id, set) in columns.iter() {
//!     println!("{}: {:?}", node_id, set.names());
//! }
//! # Ok(())
//! # }
//! ```

// Engine and execution
pub use crate::engine::{FlowEngine, FlowEngineBuilder};
pub use crate::executor::ExecutionResult;

// Flow graphs
pub use crate::flow::{FlowEdge, FlowGraph, FlowNode, FlowRequest, IntoFlow};

// Registry and custom node types
pub use crate::registry::{Arity, NodeConfig, NodeContext, NodeRegistry, NodeTransform};

// Data
pub use crate::dataset::{DatasetProvider, InMemoryDatasets, NdjsonDirectory};
pub use crate::table::{ColumnKind, ColumnSet, Table, TableSummary, Value};

// Error types
pub use crate::error::{ConfigError, ExecutionError, GraphError, TransformError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
