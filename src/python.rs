use crate::dataset::NdjsonDirectory;
use crate::engine::FlowEngine;
use crate::error::ExecutionError;
use crate::flow::FlowGraph;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;
use std::sync::Arc;

fn parse_flow(flow_json: &str) -> PyResult<FlowGraph> {
    FlowGraph::from_json(flow_json).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Invalid graphs and configs are the caller's fault; anything else failed at runtime.
fn execution_error(e: ExecutionError) -> PyErr {
    match e {
        ExecutionError::Graph(_) | ExecutionError::Config { .. } => {
            PyValueError::new_err(e.to_string())
        }
        ExecutionError::Node { .. } => PyRuntimeError::new_err(e.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// A flow graph execution engine.
///
/// Holds the built-in node types and, optionally, a directory of NDJSON
/// datasets. The same instance can execute any number of flows.
#[pyclass(name = "Nagare")]
struct NagarePy {
    engine: FlowEngine,
}

#[pymethods]
impl NagarePy {
    /// Creates an engine.
    ///
    /// Args:
    ///     datasets_dir (str | None): A directory of `<name>.ndjson` files that
    ///         DataSource nodes can load by name.
    ///
    /// Raises:
    ///     ValueError: If the directory's `schemas.json` cannot be read.
    #[new]
    #[pyo3(signature = (datasets_dir=None))]
    fn new(datasets_dir: Option<&str>) -> PyResult<Self> {
        let mut builder = FlowEngine::builder();
        if let Some(dir) = datasets_dir {
            let datasets =
                NdjsonDirectory::open(dir).map_err(|e| PyValueError::new_err(e.to_string()))?;
            builder = builder.with_datasets(Arc::new(datasets));
        }
        Ok(NagarePy {
            engine: builder.build(),
        })
    }

    /// Executes a flow and returns every node's table.
    ///
    /// Args:
    ///     flow_json (str): The flow graph, bare or wrapped as `{"flow_graph": ...}`.
    ///
    /// Returns:
    ///     str: A JSON object mapping node ids to `{"columns", "rows"}`.
    ///
    /// Raises:
    ///     ValueError: If the flow is invalid or a node is misconfigured.
    ///     RuntimeError: If a node fails while running.
    fn execute(&self, flow_json: &str) -> PyResult<String> {
        let graph = parse_flow(flow_json)?;
        let result = self.engine.execute(&graph).map_err(execution_error)?;
        to_json(&result)
    }

    /// Computes every node's output columns without loading rows.
    ///
    /// Returns:
    ///     str: A JSON object mapping node ids to column name lists.
    fn execute_metadata(&self, flow_json: &str) -> PyResult<String> {
        let graph = parse_flow(flow_json)?;
        let result = self.engine.execute_metadata(&graph).map_err(execution_error)?;
        to_json(&result)
    }

    /// Lists the columns each node receives from its first input.
    ///
    /// Returns:
    ///     str: A JSON object mapping node ids to column name lists.
    fn allowed_fields(&self, flow_json: &str) -> PyResult<String> {
        let graph = parse_flow(flow_json)?;
        let result = self.engine.allowed_fields(&graph).map_err(execution_error)?;
        to_json(&result)
    }
}

/// Python bindings for the nagare flow graph engine.
#[pymodule]
fn nagare(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<NagarePy>()?;
    Ok(())
}
