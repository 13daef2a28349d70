//! Built-in node types.
//!
//! Every transform derives its output columns through one planning function
//! that both `run` and `columns` call, so full and schema-only execution can
//! never disagree about a node's column set.

use crate::error::TransformError;
use crate::registry::{NodeRegistry, NodeTransform};
use crate::table::Value;
use std::sync::Arc;

pub mod anomaly;
pub mod data_source;
pub mod filter;
pub mod forecast;
pub mod group;
pub mod merge;
pub mod sort;
pub mod stats;
pub mod visual;

pub use anomaly::Anomaly;
pub use data_source::DataSource;
pub use filter::Filter;
pub use forecast::Forecast;
pub use group::Group;
pub use merge::Merge;
pub use sort::Sort;
pub use visual::{ChartDescriptor, ChartKind, ChartSeries, ChartTransform, Export};

/// Registers every built-in node type, plus the `exampledata` alias for
/// `datasource`.
pub(crate) fn register_default_transforms(registry: &mut NodeRegistry) {
    let source: Arc<dyn NodeTransform> = Arc::new(DataSource);
    registry.register(source.clone());
    registry.register_as("exampledata", source);

    registry.register(Arc::new(Filter));
    registry.register(Arc::new(Sort));
    registry.register(Arc::new(Merge));
    registry.register(Arc::new(Group));
    registry.register(Arc::new(Forecast));
    registry.register(Arc::new(Anomaly));
    registry.register(Arc::new(Export));
    for kind in ChartKind::ALL {
        registry.register(Arc::new(ChartTransform::new(kind)));
    }
}

/// The single input of a one-input node.
pub(crate) fn single_input<'a, T>(inputs: &[&'a T]) -> Result<&'a T, TransformError> {
    match inputs {
        [input] => Ok(input),
        _ => Err(TransformError::Failed(format!(
            "expected exactly one input, got {}",
            inputs.len()
        ))),
    }
}

/// Reads a cell as a number; nulls read as `None`, anything else is an error.
pub(crate) fn numeric(
    value: &Value,
    column: &str,
    operation: &str,
) -> Result<Option<f64>, TransformError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(*n)),
        other => Err(TransformError::NonNumeric {
            column: column.to_string(),
            operation: operation.to_string(),
            found: other.to_string(),
        }),
    }
}
