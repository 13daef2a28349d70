use super::single_input;
use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform};
use crate::table::{ColumnSet, Table, Value};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterConfig {
    #[serde(default)]
    rules: Vec<RuleConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleConfig {
    field: String,
    condition: String,
    #[serde(default)]
    value: JsonValue,
    #[serde(default)]
    operator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
}

impl Condition {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(match name.trim().to_lowercase().as_str() {
            "gt" => Condition::Gt,
            "gte" => Condition::Gte,
            "lt" => Condition::Lt,
            "lte" => Condition::Lte,
            "eq" => Condition::Eq,
            "neq" => Condition::Neq,
            "in" => Condition::In,
            "nin" => Condition::NotIn,
            "contains" => Condition::Contains,
            "ncontains" => Condition::NotContains,
            "startswith" => Condition::StartsWith,
            "nstartswith" => Condition::NotStartsWith,
            other => {
                return Err(invalid(
                    "condition",
                    format!("unknown filter condition '{}'", other),
                ));
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Operand {
    Scalar(Value),
    List(Vec<Value>),
    Text(String),
}

/// One validated rule of the chain.
#[derive(Debug, Clone)]
struct Rule {
    field: String,
    condition: Condition,
    operand: Operand,
    join: Join,
}

impl Rule {
    fn compile(index: usize, rule: RuleConfig) -> Result<Self, ConfigError> {
        let condition = Condition::parse(&rule.condition)?;

        // The first rule starts the chain; its operator is never read.
        let join = match rule.operator.as_deref().map(|op| op.trim().to_uppercase()) {
            _ if index == 0 => Join::And,
            None => Join::And,
            Some(op) if op == "AND" => Join::And,
            Some(op) if op == "OR" => Join::Or,
            Some(op) => {
                return Err(invalid(
                    "operator",
                    format!("unknown logical operator '{}'", op),
                ));
            }
        };

        let operand = match condition {
            Condition::In | Condition::NotIn => match &rule.value {
                JsonValue::Array(items) => {
                    Operand::List(items.iter().map(Value::from_json).collect())
                }
                _ => return Err(invalid("value", "'in' and 'nin' need an array value")),
            },
            Condition::Contains
            | Condition::NotContains
            | Condition::StartsWith
            | Condition::NotStartsWith => match &rule.value {
                JsonValue::String(text) => Operand::Text(text.clone()),
                _ => {
                    return Err(invalid(
                        "value",
                        format!("'{}' needs a string value", rule.condition),
                    ));
                }
            },
            _ => Operand::Scalar(Value::from_json(&rule.value)),
        };

        Ok(Self {
            field: rule.field,
            condition,
            operand,
            join,
        })
    }

    fn matches(&self, cell: &Value) -> bool {
        let ordering = |target: &Value| cell.compare(target);
        match (&self.condition, &self.operand) {
            (Condition::Gt, Operand::Scalar(v)) => ordering(v) == Some(Ordering::Greater),
            (Condition::Gte, Operand::Scalar(v)) => {
                matches!(ordering(v), Some(Ordering::Greater | Ordering::Equal))
            }
            (Condition::Lt, Operand::Scalar(v)) => ordering(v) == Some(Ordering::Less),
            (Condition::Lte, Operand::Scalar(v)) => {
                matches!(ordering(v), Some(Ordering::Less | Ordering::Equal))
            }
            (Condition::Eq, Operand::Scalar(v)) => equals(cell, v),
            (Condition::Neq, Operand::Scalar(v)) => !equals(cell, v),
            (Condition::In, Operand::List(items)) => items.iter().any(|v| equals(cell, v)),
            (Condition::NotIn, Operand::List(items)) => !items.iter().any(|v| equals(cell, v)),
            (Condition::Contains, Operand::Text(t)) => {
                cell.as_str().is_some_and(|s| s.contains(t.as_str()))
            }
            (Condition::NotContains, Operand::Text(t)) => {
                !cell.as_str().is_some_and(|s| s.contains(t.as_str()))
            }
            (Condition::StartsWith, Operand::Text(t)) => {
                !cell.is_null() && cell.to_string().starts_with(t.as_str())
            }
            (Condition::NotStartsWith, Operand::Text(t)) => {
                cell.is_null() || !cell.to_string().starts_with(t.as_str())
            }
            _ => false,
        }
    }
}

fn equals(cell: &Value, target: &Value) -> bool {
    !cell.is_null() && cell.compare(target) == Some(Ordering::Equal)
}

fn compile(config: &NodeConfig) -> Result<Vec<Rule>, ConfigError> {
    let config: FilterConfig = config.parse()?;
    config
        .rules
        .into_iter()
        .enumerate()
        .map(|(i, rule)| Rule::compile(i, rule))
        .collect()
}

/// Keeps the rows matching a left-to-right chain of AND/OR rules.
pub struct Filter;

impl NodeTransform for Filter {
    fn node_type(&self) -> &str {
        "filter"
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
        let rules = compile(config)?;
        if rules.is_empty() {
            return Ok(input.clone());
        }

        let positions = rules
            .iter()
            .map(|rule| input.columns().require(&rule.field))
            .collect::<Result<Vec<_>, _>>()?;

        let keep = input.rows().iter().enumerate().filter_map(|(i, row)| {
            let keep = rules
                .iter()
                .zip(&positions)
                .fold(true, |acc, (rule, &column)| {
                    let hit = rule.matches(&row[column]);
                    match rule.join {
                        Join::And => acc && hit,
                        Join::Or => acc || hit,
                    }
                });
            keep.then_some(i)
        });
        Ok(input.select_rows(keep))
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        let input = single_input(inputs)?;
        compile(config)?;
        Ok(input.clone())
    }
}
