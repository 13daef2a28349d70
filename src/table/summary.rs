//! Row counts and inferred column types, for callers that want to know what a
//! node produced without receiving its rows.

use super::{Table, Value, parse_timestamp};
use serde::Serialize;

/// The inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int,
    Float,
    Bool,
    /// Timestamps, or strings that all parse as dates.
    Timestamp,
    Str,
    /// Values of incompatible kinds.
    Object,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnKind::Bool),
            Value::Number(n) if n.fract() == 0.0 => Some(ColumnKind::Int),
            Value::Number(_) => Some(ColumnKind::Float),
            Value::Timestamp(_) => Some(ColumnKind::Timestamp),
            Value::String(s) if parse_timestamp(s).is_some() => Some(ColumnKind::Timestamp),
            Value::String(_) => Some(ColumnKind::Str),
        }
    }

    fn widen(self, other: Self) -> Self {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            (Timestamp, Str) | (Str, Timestamp) => Str,
            _ => Object,
        }
    }

    /// The narrowest kind covering every non-null value. Columns without
    /// any value read as `Str`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        values
            .into_iter()
            .filter_map(Self::of)
            .reduce(Self::widen)
            .unwrap_or(ColumnKind::Str)
    }
}

/// What one node produced, without the rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub total_rows: usize,
    pub column_names: Vec<String>,
    pub column_types: Vec<ColumnKind>,
}

impl Table {
    pub fn summary(&self) -> TableSummary {
        let column_types = (0..self.columns().len())
            .map(|i| ColumnKind::infer(self.rows().iter().map(|row| &row[i])))
            .collect();
        TableSummary {
            total_rows: self.row_count(),
            column_names: self.columns().names().to_vec(),
            column_types,
        }
    }
}
