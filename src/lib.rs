//! # Nagare - Flow Graph Execution Engine
//!
//! **Nagare** executes node-based data pipelines. A flow graph is a DAG of
//! typed nodes (data sources, filters, sorts, merges, groupings, forecasts,
//! anomaly detection, charts and exports). Each node turns the tables of its
//! upstream nodes into one table of its own.
//!
//! ## Core Workflow
//!
//! 1.  **Load a Flow**: Parse a flow document into a `FlowGraph`, either
//!     directly from JSON or through your own format via the `IntoFlow` trait.
//! 2.  **Build an Engine**: `FlowEngine::builder()` sets up the node registry
//!     (built-ins, custom transforms, type mappings) and a dataset provider.
//! 3.  **Execute**: `execute` runs every node on real rows and returns a
//!     table per node. `execute_metadata` computes only each node's output
//!     columns, which is what a flow editor needs to offer field pickers
//!     while the user is still wiring the graph.
//!
//! Both modes validate the graph first (duplicate ids, dangling edges,
//! cycles, unknown node types, input arity) and run nodes in a deterministic
//! topological order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nagare::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let graph = FlowGraph {
//!         nodes: vec![
//!             FlowNode::new(
//!                 "sales",
//!                 "datasource",
//!                 json!({"input": [
//!                     {"date": "2024-01-01", "region": "north", "amount": 120},
//!                     {"date": "2024-01-01", "region": "south", "amount": 80},
//!                     {"date": "2024-01-02", "region": "north", "amount": 95}
//!                 ]}),
//!             ),
//!             FlowNode::new(
//!                 "daily",
//!                 "group",
//!                 json!({"group_by": ["date"], "aggregations": ["sum"], "fields": ["amount"]}),
//!             ),
//!         ],
//!         edges: vec![FlowEdge::new("sales", "daily")],
//!     };
//!
//!     let engine = FlowEngine::default();
//!
//!     let columns = engine.execute_metadata(&graph)?;
//!     println!("daily columns: {:?}", columns["daily"].names());
//!
//!     let tables = engine.execute(&graph)?;
//!     println!("{}", serde_json::to_string_pretty(&tables)?);
//!     Ok(())
//! }
//! ```

pub mod dataset;
pub mod engine;
pub mod error;
pub mod executor;
pub mod flow;
pub mod graph;
pub mod nodes;
pub mod prelude;
pub mod registry;
pub mod table;

#[cfg(feature = "python-bindings")]
mod python;
