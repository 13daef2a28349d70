use super::config::NodeConfig;
use crate::dataset::DatasetProvider;
use crate::error::TransformError;
use crate::nodes::ChartDescriptor;
use crate::table::{ColumnSet, Table};
use std::fmt;

/// How many input edges a node type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// A source node; no edge may target it.
    None,
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::None => count == 0,
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => write!(f, "no"),
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// What a transform knows about the node it is running for.
pub struct NodeContext<'a> {
    pub node_id: &'a str,
    pub datasets: &'a dyn DatasetProvider,
}

/// Defines the contract for one node type, in both execution modes.
///
/// `run` computes the node's table from its upstream tables; `columns`
/// computes the same table's column names from upstream column sets alone.
/// For every valid config the two must agree: `run(..).columns()` is exactly
/// what `columns(..)` returns for the projected inputs.
///
/// Inputs arrive ordered by target slot, then edge declaration order. The
/// validator has already checked their count against `arity()`.
pub trait NodeTransform: Send + Sync {
    fn node_type(&self) -> &str;

    fn arity(&self) -> Arity;

    fn run(
        &self,
        ctx: &NodeContext,
        inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError>;

    fn columns(
        &self,
        ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError>;

    /// Visualization nodes describe the chart to draw from their output.
    fn describe(
        &self,
        _config: &NodeConfig,
        _output: &Table,
    ) -> Option<Result<ChartDescriptor, TransformError>> {
        None
    }
}

pub type RunFn =
    dyn Fn(&NodeContext, &[&Table], &NodeConfig) -> Result<Table, TransformError> + Send + Sync;
pub type ColumnsFn =
    dyn Fn(&NodeContext, &[&ColumnSet], &NodeConfig) -> Result<ColumnSet, TransformError>
        + Send
        + Sync;

/// A transform assembled from a pair of closures.
pub struct FnTransform {
    node_type: String,
    arity: Arity,
    run: Box<RunFn>,
    columns: Box<ColumnsFn>,
}

impl FnTransform {
    pub fn new<R, C>(node_type: impl Into<String>, arity: Arity, run: R, columns: C) -> Self
    where
        R: Fn(&NodeContext, &[&Table], &NodeConfig) -> Result<Table, TransformError>
            + Send
            + Sync
            + 'static,
        C: Fn(&NodeContext, &[&ColumnSet], &NodeConfig) -> Result<ColumnSet, TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            node_type: node_type.into(),
            arity,
            run: Box::new(run),
            columns: Box::new(columns),
        }
    }
}

impl NodeTransform for FnTransform {
    fn node_type(&self) -> &str {
        &self.node_type
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn run(
        &self,
        ctx: &NodeContext,
        inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError> {
        (self.run)(ctx, inputs, config)
    }

    fn columns(
        &self,
        ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        (self.columns)(ctx, inputs, config)
    }
}
