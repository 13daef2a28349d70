//! Runs a validated flow node by node in scheduler order.
//!
//! Full execution and schema-only execution share one driver. An
//! [`ExecutionMode`] decides what flows along the edges (tables or column
//! sets) and which half of a transform computes it.

use crate::dataset::DatasetProvider;
use crate::error::{ExecutionError, TransformError};
use crate::graph::ValidatedFlow;
use crate::graph::scheduler::schedule;
use crate::nodes::ChartDescriptor;
use crate::registry::{NodeConfig, NodeContext, NodeTransform};
use crate::table::{ColumnSet, Table};
use std::time::Instant;

mod result;

pub use result::ExecutionResult;

/// What one execution mode passes between nodes.
pub trait ExecutionMode {
    type Output;

    const NAME: &'static str;

    fn dispatch(
        transform: &dyn NodeTransform,
        ctx: &NodeContext,
        inputs: &[&Self::Output],
        config: &NodeConfig,
    ) -> Result<Self::Output, TransformError>;

    /// Column count, for logging.
    fn width(output: &Self::Output) -> usize;

    /// A chart descriptor for the node, if this mode produces them.
    fn chart(
        _transform: &dyn NodeTransform,
        _config: &NodeConfig,
        _output: &Self::Output,
    ) -> Option<Result<ChartDescriptor, TransformError>> {
        None
    }
}

/// Runs every transform on real rows.
pub struct Full;

/// Derives column sets only; no rows are read beyond what dataset schemas need.
pub struct Schema;

impl ExecutionMode for Full {
    type Output = Table;

    const NAME: &'static str = "full";

    fn dispatch(
        transform: &dyn NodeTransform,
        ctx: &NodeContext,
        inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError> {
        transform.run(ctx, inputs, config)
    }

    fn width(output: &Table) -> usize {
        output.columns().len()
    }

    fn chart(
        transform: &dyn NodeTransform,
        config: &NodeConfig,
        output: &Table,
    ) -> Option<Result<ChartDescriptor, TransformError>> {
        transform.describe(config, output)
    }
}

impl ExecutionMode for Schema {
    type Output = ColumnSet;

    const NAME: &'static str = "schema";

    fn dispatch(
        transform: &dyn NodeTransform,
        ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        transform.columns(ctx, inputs, config)
    }

    fn width(output: &ColumnSet) -> usize {
        output.len()
    }
}

fn node_error(node_id: &str, error: TransformError) -> ExecutionError {
    match error {
        TransformError::Config(source) => ExecutionError::Config {
            node_id: node_id.to_string(),
            source,
        },
        source => ExecutionError::Node {
            node_id: node_id.to_string(),
            source,
        },
    }
}

/// Executes `flow` in mode `M`. The first failing node aborts the run.
pub(crate) fn drive<M: ExecutionMode>(
    flow: &ValidatedFlow,
    datasets: &dyn DatasetProvider,
) -> Result<ExecutionResult<M::Output>, ExecutionError> {
    let started = Instant::now();
    let index = flow.index();
    let order = schedule(flow);

    let mut outputs: Vec<Option<M::Output>> = Vec::with_capacity(index.len());
    outputs.resize_with(index.len(), || None);
    let mut charts = Vec::new();

    for &position in &order {
        let node = flow.node(position);
        let transform = flow.transform(position);

        let inputs = index
            .predecessors(position)
            .iter()
            .map(|&p| {
                outputs[p].as_ref().ok_or_else(|| {
                    TransformError::Failed(format!(
                        "input from '{}' is not available",
                        index.id(p)
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| node_error(&node.id, e))?;

        let ctx = NodeContext {
            node_id: &node.id,
            datasets,
        };
        let config = NodeConfig::new(&node.node_type, &node.config);

        let node_started = Instant::now();
        let output = M::dispatch(transform.as_ref(), &ctx, &inputs, &config).map_err(|e| {
            log::warn!("Node '{}' ({}) failed: {}", node.id, node.node_type, e);
            node_error(&node.id, e)
        })?;
        log::debug!(
            "Ran node '{}' ({}) in {} mode: {} input(s), {} column(s), {:?}",
            node.id,
            node.node_type,
            M::NAME,
            inputs.len(),
            M::width(&output),
            node_started.elapsed()
        );

        if let Some(chart) = M::chart(transform.as_ref(), &config, &output) {
            charts.push((position, chart.map_err(|e| node_error(&node.id, e))?));
        }
        outputs[position] = Some(output);
    }

    let mut result = ExecutionResult::default();
    for &position in &order {
        if let Some(output) = outputs[position].take() {
            result.push(index.id(position), output);
        }
    }
    for (position, chart) in charts {
        result.push_chart(index.id(position), chart);
    }

    log::info!(
        "Executed {} node(s) in {} mode in {:?}",
        result.len(),
        M::NAME,
        started.elapsed()
    );
    Ok(result)
}

/// The columns each node may reference: those of its first input.
/// Source nodes get an empty set.
pub(crate) fn allowed_fields(
    flow: &ValidatedFlow,
    schema: &ExecutionResult<ColumnSet>,
) -> ExecutionResult<ColumnSet> {
    let index = flow.index();
    let mut allowed = ExecutionResult::default();
    for position in schedule(flow) {
        let fields = index
            .predecessors(position)
            .first()
            .and_then(|&p| schema.get(index.id(p)))
            .cloned()
            .unwrap_or_default();
        allowed.push(index.id(position), fields);
    }
    allowed
}
