use super::{numeric, single_input, stats};
use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform, OneOrMany};
use crate::table::{ColumnSet, Table, Value};
use ahash::AHashSet;
use itertools::Itertools;
use serde::Deserialize;
use std::cmp::Ordering;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupConfig {
    group_by: OneOrMany<String>,
    #[serde(default)]
    aggregations: Option<OneOrMany<String>>,
    #[serde(default)]
    fields: Option<OneOrMany<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Std,
    Var,
    First,
    Last,
    NUnique,
}

impl Aggregation {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(match name.trim().to_lowercase().as_str() {
            "sum" => Aggregation::Sum,
            "mean" => Aggregation::Mean,
            "median" => Aggregation::Median,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "count" => Aggregation::Count,
            "std" => Aggregation::Std,
            "var" => Aggregation::Var,
            "first" => Aggregation::First,
            "last" => Aggregation::Last,
            "nunique" => Aggregation::NUnique,
            other => {
                return Err(invalid(
                    "aggregations",
                    format!("unknown aggregation '{}'", other),
                ));
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Count => "count",
            Aggregation::Std => "std",
            Aggregation::Var => "var",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::NUnique => "nunique",
        }
    }

    /// Folds the non-null values of one group.
    fn apply(&self, column: &str, values: &[&Value]) -> Result<Value, TransformError> {
        match self {
            Aggregation::Count => return Ok(Value::Number(values.len() as f64)),
            Aggregation::NUnique => {
                let distinct: AHashSet<&Value> = values.iter().copied().collect();
                return Ok(Value::Number(distinct.len() as f64));
            }
            Aggregation::First => return Ok(values.first().map_or(Value::Null, |v| (*v).clone())),
            Aggregation::Last => return Ok(values.last().map_or(Value::Null, |v| (*v).clone())),
            Aggregation::Min => {
                return Ok(values
                    .iter()
                    .min_by(|a, b| a.total_cmp(b))
                    .map_or(Value::Null, |v| (*v).clone()));
            }
            Aggregation::Max => {
                return Ok(values
                    .iter()
                    .max_by(|a, b| a.total_cmp(b))
                    .map_or(Value::Null, |v| (*v).clone()));
            }
            _ => {}
        }

        let mut numbers = Vec::with_capacity(values.len());
        for value in values {
            if let Some(n) = numeric(value, column, self.name())? {
                numbers.push(n);
            }
        }
        let result = match self {
            Aggregation::Sum => (!numbers.is_empty()).then(|| numbers.iter().sum::<f64>()),
            Aggregation::Mean => stats::mean(&numbers),
            Aggregation::Median => stats::median(&numbers),
            Aggregation::Std => stats::std_dev(&numbers, 1),
            Aggregation::Var => stats::variance(&numbers, 1),
            _ => None,
        };
        Ok(result.map_or(Value::Null, Value::Number))
    }
}

/// What each output column after the keys holds.
#[derive(Debug, Clone)]
enum Output {
    Aggregate { field: String, aggregation: Aggregation },
    Size,
}

#[derive(Debug, Clone)]
struct GroupPlan {
    keys: Vec<String>,
    outputs: Vec<Output>,
    columns: ColumnSet,
}

fn plan(input: &ColumnSet, config: &NodeConfig) -> Result<GroupPlan, TransformError> {
    let config: GroupConfig = config.parse()?;
    let keys = config.group_by.into_vec();
    if keys.is_empty() {
        return Err(invalid("group_by", "at least one grouping column is required").into());
    }

    let outputs = match (config.aggregations, config.fields) {
        (None, None) => vec![Output::Size],
        (None, Some(_)) => {
            return Err(invalid("fields", "'fields' requires 'aggregations'").into());
        }
        (Some(aggregations), fields) => {
            let aggregations = aggregations
                .into_vec()
                .iter()
                .map(|name| Aggregation::parse(name))
                .collect::<Result<Vec<_>, _>>()?;
            if aggregations.is_empty() {
                return Err(invalid("aggregations", "at least one aggregation is required").into());
            }
            let fields = match fields {
                Some(fields) => fields.into_vec(),
                None => input
                    .iter()
                    .filter(|c| !keys.iter().any(|k| k.as_str() == *c))
                    .map(str::to_string)
                    .collect(),
            };
            fields
                .into_iter()
                .flat_map(|field| {
                    aggregations.iter().map(move |&aggregation| Output::Aggregate {
                        field: field.clone(),
                        aggregation,
                    })
                })
                .collect()
        }
    };

    let names = keys
        .iter()
        .cloned()
        .chain(outputs.iter().map(|output| match output {
            Output::Aggregate { field, aggregation } => format!("{}_{}", field, aggregation.name()),
            Output::Size => "count".to_string(),
        }));
    let columns = ColumnSet::from_names(names)?;

    Ok(GroupPlan {
        keys,
        outputs,
        columns,
    })
}

/// Groups rows by key columns and aggregates the rest.
pub struct Group;

impl NodeTransform for Group {
    fn node_type(&self) -> &str {
        "group"
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
        let plan = plan(input.columns(), config)?;
        let key_positions = plan
            .keys
            .iter()
            .map(|k| input.columns().require(k))
            .collect::<Result<Vec<_>, _>>()?;
        let output_positions = plan
            .outputs
            .iter()
            .map(|output| match output {
                Output::Aggregate { field, .. } => input.columns().require(field).map(Some),
                Output::Size => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = input.rows();
        let key_of = |i: usize| -> Vec<&Value> {
            key_positions.iter().map(|&k| &rows[i][k]).collect()
        };

        // Rows with a null key belong to no group.
        let mut order: Vec<usize> = (0..rows.len())
            .filter(|&i| key_positions.iter().all(|&k| !rows[i][k].is_null()))
            .collect();
        order.sort_by(|&a, &b| {
            key_of(a)
                .iter()
                .zip(key_of(b).iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let groups = order.into_iter().chunk_by(|&i| key_of(i));
        let mut out = Vec::new();
        for (key, members) in &groups {
            let members: Vec<usize> = members.collect();
            let mut row: Vec<Value> = key.into_iter().cloned().collect();
            for (output, position) in plan.outputs.iter().zip(&output_positions) {
                let value = match (output, position) {
                    (Output::Aggregate { field, aggregation }, Some(column)) => {
                        let values: Vec<&Value> = members
                            .iter()
                            .map(|&i| &rows[i][*column])
                            .filter(|v| !v.is_null())
                            .collect();
                        aggregation.apply(field, &values)?
                    }
                    _ => Value::Number(members.len() as f64),
                };
                row.push(value);
            }
            out.push(row);
        }

        Table::new(plan.columns, out)
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        let input = single_input(inputs)?;
        Ok(plan(input, config)?.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_aggregations_skip_nothing_but_nulls() {
        let values = [Value::Number(1.0), Value::Number(2.0), Value::Number(6.0)];
        let refs: Vec<&Value> = values.iter().collect();
        assert_eq!(Aggregation::Sum.apply("x", &refs).unwrap(), Value::Number(9.0));
        assert_eq!(Aggregation::Median.apply("x", &refs).unwrap(), Value::Number(2.0));
        assert_eq!(Aggregation::Var.apply("x", &refs).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn non_numeric_values_fail_numeric_aggregations() {
        let values = [Value::from("a")];
        let refs: Vec<&Value> = values.iter().collect();
        assert!(matches!(
            Aggregation::Mean.apply("x", &refs),
            Err(TransformError::NonNumeric { .. })
        ));
        assert_eq!(Aggregation::Max.apply("x", &refs).unwrap(), Value::from("a"));
        assert_eq!(Aggregation::Sum.apply("x", &[]).unwrap(), Value::Null);
    }
}
