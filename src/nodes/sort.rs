use super::single_input;
use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform, OneOrMany};
use crate::table::{ColumnSet, Table, Value};
use serde::Deserialize;
use std::cmp::Ordering;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SortConfig {
    field: OneOrMany<String>,
    #[serde(default)]
    asc: Option<OneOrMany<bool>>,
}

/// Sort keys paired with their direction.
fn keys(config: &NodeConfig) -> Result<Vec<(String, bool)>, ConfigError> {
    let config: SortConfig = config.parse()?;
    let fields = config.field.into_vec();
    if fields.is_empty() {
        return Err(invalid("field", "at least one sort field is required"));
    }
    let directions = match config.asc {
        None => vec![true; fields.len()],
        Some(OneOrMany::One(asc)) => vec![asc; fields.len()],
        Some(OneOrMany::Many(list)) if list.len() == fields.len() => list,
        Some(OneOrMany::Many(list)) => {
            return Err(invalid(
                "asc",
                format!("{} directions given for {} fields", list.len(), fields.len()),
            ));
        }
    };
    Ok(fields.into_iter().zip(directions).collect())
}

/// Nulls sort last in either direction.
fn compare_cells(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if ascending => a.total_cmp(b),
        (false, false) => b.total_cmp(a),
    }
}

/// Stable multi-key sort.
pub struct Sort;

impl NodeTransform for Sort {
    fn node_type(&self) -> &str {
        "sort"
    }

    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }

    fn run(
        &self,
        _ctx: &NodeContext,
        inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError> {
        let input = single_input(inputs)?;
        let keys = keys(config)?
            .into_iter()
            .map(|(field, asc)| Ok((input.columns().require(&field)?, asc)))
            .collect::<Result<Vec<_>, TransformError>>()?;

        let rows = input.rows();
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| {
            keys.iter()
                .map(|&(column, asc)| compare_cells(&rows[a][column], &rows[b][column], asc))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(input.select_rows(order))
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        let input = single_input(inputs)?;
        keys(config)?;
        Ok(input.clone())
    }
}
