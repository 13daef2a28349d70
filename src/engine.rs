use crate::dataset::{DatasetProvider, NoDatasets};
use crate::error::{ExecutionError, GraphError};
use crate::executor::{self, ExecutionResult, Full, Schema};
use crate::flow::FlowGraph;
use crate::graph::{self, ValidatedFlow};
use crate::registry::{NodeRegistry, NodeTransform};
use crate::table::{ColumnSet, Table};
use std::sync::Arc;

/// Validates and executes flow graphs against a fixed registry and dataset
/// provider.
///
/// An engine is immutable once built and can be shared between threads;
/// every call owns its own result store.
#[derive(Clone)]
pub struct FlowEngine {
    registry: Arc<NodeRegistry>,
    datasets: Arc<dyn DatasetProvider>,
}

pub struct FlowEngineBuilder {
    registry: NodeRegistry,
    datasets: Arc<dyn DatasetProvider>,
}

impl Default for FlowEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowEngineBuilder {
    /// Starts from the built-in node types and no datasets.
    pub fn new() -> Self {
        Self {
            registry: NodeRegistry::with_defaults(),
            datasets: Arc::new(NoDatasets),
        }
    }

    /// Replaces the whole registry, built-ins included.
    pub fn with_registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Lets flows use `user_type` for an already registered node type.
    /// Unknown target types are skipped with a warning.
    pub fn with_type_mapping(mut self, user_type: &str, builtin_type: &str) -> Self {
        if let Err(e) = self.registry.alias(user_type, builtin_type) {
            log::warn!("Ignoring type mapping '{}' -> '{}': {}", user_type, builtin_type, e);
        }
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn NodeTransform>) -> Self {
        self.registry.register(transform);
        self
    }

    pub fn with_datasets(mut self, datasets: Arc<dyn DatasetProvider>) -> Self {
        self.datasets = datasets;
        self
    }

    pub fn build(self) -> FlowEngine {
        FlowEngine {
            registry: Arc::new(self.registry),
            datasets: self.datasets,
        }
    }
}

impl Default for FlowEngine {
    fn default() -> Self {
        FlowEngineBuilder::new().build()
    }
}

impl FlowEngine {
    pub fn builder() -> FlowEngineBuilder {
        FlowEngineBuilder::new()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn datasets(&self) -> &dyn DatasetProvider {
        self.datasets.as_ref()
    }

    pub fn validate<'g>(&self, graph: &'g FlowGraph) -> Result<ValidatedFlow<'g>, GraphError> {
        graph::validate(graph, &self.registry)
    }

    /// The order nodes would run in.
    pub fn order(&self, graph: &FlowGraph) -> Result<Vec<String>, GraphError> {
        Ok(graph::order(&self.validate(graph)?))
    }

    /// Runs every node on real data.
    pub fn execute(&self, graph: &FlowGraph) -> Result<ExecutionResult<Table>, ExecutionError> {
        let flow = self.validate(graph)?;
        executor::drive::<Full>(&flow, self.datasets.as_ref())
    }

    /// Computes every node's output columns without touching row data.
    pub fn execute_metadata(
        &self,
        graph: &FlowGraph,
    ) -> Result<ExecutionResult<ColumnSet>, ExecutionError> {
        let flow = self.validate(graph)?;
        executor::drive::<Schema>(&flow, self.datasets.as_ref())
    }

    /// The columns each node receives from its first input.
    pub fn allowed_fields(
        &self,
        graph: &FlowGraph,
    ) -> Result<ExecutionResult<ColumnSet>, ExecutionError> {
        let flow = self.validate(graph)?;
        let schema = executor::drive::<Schema>(&flow, self.datasets.as_ref())?;
        Ok(executor::allowed_fields(&flow, &schema))
    }
}
