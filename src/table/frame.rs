use super::Value;
use crate::error::TransformError;
use ahash::AHashSet;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

/// The ordered, duplicate-free column names of a table.
///
/// This is all the schema-only executor ever computes: it can be derived from
/// a node's type, config and upstream column sets without touching row data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a column set, rejecting repeated names.
    pub fn from_names<I, S>(names: I) -> Result<Self, TransformError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = Self::new();
        for name in names {
            columns.push(name)?;
        }
        Ok(columns)
    }

    pub fn push(&mut self, name: impl Into<String>) -> Result<(), TransformError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(TransformError::DuplicateColumn(name));
        }
        self.0.push(name);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c == name)
    }

    /// Like `position`, but a missing column is an error.
    pub fn require(&self, name: &str) -> Result<usize, TransformError> {
        self.position(name)
            .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Collects column names in first-seen order, ignoring repeats.
#[derive(Debug, Default)]
pub struct ColumnCollector {
    names: Vec<String>,
    seen: AHashSet<String>,
}

impl ColumnCollector {
    pub fn insert(&mut self, name: &str) {
        if !self.seen.contains(name) {
            self.seen.insert(name.to_string());
            self.names.push(name.to_string());
        }
    }

    pub fn finish(self) -> ColumnSet {
        ColumnSet(self.names)
    }
}

/// Materialized tabular data: a column set plus rows aligned to it.
///
/// Tables are never mutated once a node has returned them; every transform
/// builds a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: ColumnSet,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates a table, checking that every row matches the column count.
    pub fn new(columns: ColumnSet, rows: Vec<Vec<Value>>) -> Result<Self, TransformError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(TransformError::Failed(format!(
                "row {} has {} values but the table has {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: ColumnSet) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Looks up a single cell by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.position(column)?;
        self.rows.get(row)?.get(index)
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>, TransformError> {
        let index = self.columns.require(name)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// A copy of this table keeping only the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .into_iter()
                .filter_map(|i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Renders one row as a JSON object in column order.
    pub fn record(&self, row: usize) -> Option<serde_json::Map<String, serde_json::Value>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
        )
    }

    pub fn into_parts(self) -> (ColumnSet, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}

struct RowRef<'a> {
    columns: &'a ColumnSet,
    values: &'a [Value],
}

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct Rows<'a>(&'a Table);

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.rows.iter().map(|values| RowRef {
            columns: &self.0.columns,
            values,
        }))
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Table", 2)?;
        state.serialize_field("columns", &self.columns)?;
        state.serialize_field("rows", &Rows(self))?;
        state.end()
    }
}
