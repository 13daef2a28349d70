use crate::error::{ConfigError, DatasetError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform};
use crate::table::flatten::{flatten_record, record_columns, table_from_records};
use crate::table::{ColumnSet, Table, Value};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataSourceConfig {
    input: JsonValue,
}

/// The shapes a `datasource` input may take.
enum Input<'a> {
    /// An array of records.
    Records(Vec<&'a Map<String, JsonValue>>),
    /// An object of equal-length column arrays.
    Columnar(&'a Map<String, JsonValue>),
    /// A single record.
    Record(&'a Map<String, JsonValue>),
    /// A dataset name, resolved through the dataset provider.
    Named(&'a str),
}

impl<'a> Input<'a> {
    fn classify(input: &'a JsonValue) -> Result<Self, ConfigError> {
        match input {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_object().ok_or_else(|| {
                        invalid("input", format!("record {} is not an object", i))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Input::Records),
            JsonValue::Object(map) if map.values().all(JsonValue::is_array) => {
                let lengths: Vec<usize> = map
                    .values()
                    .filter_map(JsonValue::as_array)
                    .map(Vec::len)
                    .collect();
                if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
                    return Err(invalid("input", "column arrays differ in length"));
                }
                Ok(Input::Columnar(map))
            }
            JsonValue::Object(map) => Ok(Input::Record(map)),
            JsonValue::String(name) => Ok(Input::Named(name)),
            other => Err(invalid(
                "input",
                format!(
                    "expected records, columns or a dataset name, found {}",
                    other
                ),
            )),
        }
    }
}

fn parse(config: &NodeConfig) -> Result<DataSourceConfig, ConfigError> {
    config.parse()
}

/// Produces the flow's initial table from inline data or a named dataset.
pub struct DataSource;

impl NodeTransform for DataSource {
    fn node_type(&self) -> &str {
        "datasource"
    }

    fn arity(&self) -> Arity {
        Arity::None
    }

    fn run(
        &self,
        ctx: &NodeContext,
        _inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError> {
        let config = parse(config)?;
        match Input::classify(&config.input)? {
            Input::Records(records) => Ok(table_from_records(&records)),
            Input::Record(record) => Ok(table_from_records(&[record])),
            Input::Columnar(map) => columnar_table(map),
            Input::Named(name) => {
                let records = ctx.datasets.load(name)?;
                let records: Vec<_> = records.iter().collect();
                match ctx.datasets.declared_columns(name)? {
                    Some(columns) => declared_table(name, &records, columns),
                    None => Ok(table_from_records(&records)),
                }
            }
        }
    }

    fn columns(
        &self,
        ctx: &NodeContext,
        _inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        let config = parse(config)?;
        match Input::classify(&config.input)? {
            Input::Records(records) => Ok(record_columns(records)),
            Input::Record(record) => Ok(record_columns([record])),
            Input::Columnar(map) => ColumnSet::from_names(map.keys().cloned()),
            Input::Named(name) => Ok(ctx.datasets.columns(name)?),
        }
    }
}

/// Lays records out in a dataset's declared columns.
fn declared_table(
    name: &str,
    records: &[&Map<String, JsonValue>],
    columns: ColumnSet,
) -> Result<Table, TransformError> {
    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![Value::Null; columns.len()];
            for (column, value) in flatten_record(record) {
                let at = columns
                    .position(&column)
                    .ok_or_else(|| DatasetError::UndeclaredColumn {
                        name: name.to_string(),
                        column: column.clone(),
                    })?;
                row[at] = value;
            }
            Ok(row)
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;
    Table::new(columns, rows)
}

fn columnar_table(map: &Map<String, JsonValue>) -> Result<Table, TransformError> {
    let columns = ColumnSet::from_names(map.keys().cloned())?;
    let arrays: Vec<&Vec<JsonValue>> = map.values().filter_map(JsonValue::as_array).collect();
    let height = arrays.first().map_or(0, |a| a.len());
    let rows = (0..height)
        .map(|row| arrays.iter().map(|a| Value::from_json(&a[row])).collect())
        .collect();
    Table::new(columns, rows)
}
