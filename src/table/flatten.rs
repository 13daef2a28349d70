//! Flattening of nested JSON records into dotted column names.
//!
//! `{"a": {"b": 1}}` becomes the column `a.b`. Key discovery (`record_columns`)
//! walks only the object structure, so schema lookups never convert values.

use super::{ColumnCollector, ColumnSet, Table, Value};
use ahash::AHashMap;
use serde_json::{Map, Value as JsonValue};

pub const KEY_SEPARATOR: &str = ".";

type Record = Map<String, JsonValue>;

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, key)
    }
}

/// Flattens one record into `(column, value)` pairs in key order.
pub fn flatten_record(record: &Record) -> Vec<(String, Value)> {
    let mut out = Vec::with_capacity(record.len());
    flatten_into(record, "", &mut out);
    out
}

fn flatten_into(record: &Record, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in record {
        let name = join_key(prefix, key);
        match value {
            JsonValue::Object(inner) => flatten_into(inner, &name, out),
            other => out.push((name, Value::from_json(other))),
        }
    }
}

fn collect_keys(record: &Record, prefix: &str, collector: &mut ColumnCollector) {
    for (key, value) in record {
        let name = join_key(prefix, key);
        match value {
            JsonValue::Object(inner) => collect_keys(inner, &name, collector),
            _ => collector.insert(&name),
        }
    }
}

/// The union of flattened keys over `records`, in first-seen order.
pub fn record_columns<'a>(records: impl IntoIterator<Item = &'a Record>) -> ColumnSet {
    let mut collector = ColumnCollector::default();
    for record in records {
        collect_keys(record, "", &mut collector);
    }
    collector.finish()
}

/// Builds a table from records. Columns follow `record_columns`; a record
/// without some column gets a null cell there.
pub fn table_from_records(records: &[&Record]) -> Table {
    let columns = record_columns(records.iter().copied());
    let index: AHashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![Value::Null; columns.len()];
            for (name, value) in flatten_record(record) {
                if let Some(&i) = index.get(name.as_str()) {
                    row[i] = value;
                }
            }
            row
        })
        .collect();

    // Every row was sized from `columns`, so construction cannot fail.
    Table::new(columns.clone(), rows).unwrap_or_else(|_| Table::empty(columns))
}
