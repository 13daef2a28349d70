//! Named datasets that a `datasource` node can reference by string.

use crate::error::DatasetError;
use crate::table::ColumnSet;
use crate::table::flatten::record_columns;
use ahash::AHashMap;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub type Record = Map<String, JsonValue>;

/// Looks up datasets by name.
///
/// Implementations are shared by concurrent executions and must be read-only
/// from the engine's point of view.
pub trait DatasetProvider: Send + Sync {
    /// Loads every record of the dataset.
    fn load(&self, name: &str) -> Result<Vec<Record>, DatasetError>;

    /// Columns the provider declares for the dataset without reading it.
    ///
    /// When this returns a set, full execution lays loaded rows out in exactly
    /// these columns and fails on any record key the set does not list, so
    /// both execution modes agree.
    fn declared_columns(&self, _name: &str) -> Result<Option<ColumnSet>, DatasetError> {
        Ok(None)
    }

    /// The dataset's flattened column names, as schema-only execution sees
    /// them: the declared columns, else the keys of the loaded records.
    fn columns(&self, name: &str) -> Result<ColumnSet, DatasetError> {
        match self.declared_columns(name)? {
            Some(columns) => Ok(columns),
            None => Ok(record_columns(&self.load(name)?)),
        }
    }
}

/// The provider used when none is configured: every name is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDatasets;

impl DatasetProvider for NoDatasets {
    fn load(&self, name: &str) -> Result<Vec<Record>, DatasetError> {
        Err(DatasetError::NotFound(name.to_string()))
    }
}

/// Datasets held in memory, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatasets {
    datasets: AHashMap<String, Vec<Record>>,
}

impl InMemoryDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dataset from a JSON array of objects. Non-object entries are skipped.
    pub fn with(mut self, name: impl Into<String>, records: JsonValue) -> Self {
        self.insert(name, records);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, records: JsonValue) {
        let records = match records {
            JsonValue::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    JsonValue::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
            JsonValue::Object(record) => vec![record],
            _ => Vec::new(),
        };
        self.datasets.insert(name.into(), records);
    }
}

impl DatasetProvider for InMemoryDatasets {
    fn load(&self, name: &str) -> Result<Vec<Record>, DatasetError> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| DatasetError::NotFound(name.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaEntry {
    Columns(Vec<String>),
    Typed(Map<String, JsonValue>),
}

pub const SCHEMA_FILE: &str = "schemas.json";

/// A directory of `<name>.ndjson` files, one JSON record per line.
///
/// If the directory holds a `schemas.json` (`{name: [columns]}` or
/// `{name: {column: type}}`), its entries are the declared columns of those
/// datasets: column lookups are answered without reading the data files, and
/// loaded rows take the declared order.
#[derive(Debug, Clone)]
pub struct NdjsonDirectory {
    root: PathBuf,
    schemas: AHashMap<String, ColumnSet>,
}

impl NdjsonDirectory {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let root = root.as_ref().to_path_buf();
        let schema_path = root.join(SCHEMA_FILE);
        let schemas = match fs::read_to_string(&schema_path) {
            Ok(text) => parse_schemas(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => AHashMap::new(),
            Err(e) => return Err(DatasetError::Schema(e.to_string())),
        };
        log::debug!(
            "Opened dataset directory {} ({} schema entries)",
            root.display(),
            schemas.len()
        );
        Ok(Self { root, schemas })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, DatasetError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        if !valid {
            return Err(DatasetError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{}.ndjson", name)))
    }
}

fn parse_schemas(text: &str) -> Result<AHashMap<String, ColumnSet>, DatasetError> {
    let entries: Map<String, JsonValue> =
        serde_json::from_str(text).map_err(|e| DatasetError::Schema(e.to_string()))?;
    entries
        .into_iter()
        .map(|(name, entry)| {
            let entry: SchemaEntry = serde_json::from_value(entry)
                .map_err(|e| DatasetError::Schema(format!("entry '{}': {}", name, e)))?;
            let names: Vec<String> = match entry {
                SchemaEntry::Columns(columns) => columns,
                SchemaEntry::Typed(columns) => columns.into_iter().map(|(k, _)| k).collect(),
            };
            let columns = ColumnSet::from_names(names)
                .map_err(|e| DatasetError::Schema(format!("entry '{}': {}", name, e)))?;
            Ok((name, columns))
        })
        .collect()
}

impl DatasetProvider for NdjsonDirectory {
    fn load(&self, name: &str) -> Result<Vec<Record>, DatasetError> {
        let path = self.path_for(name)?;
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DatasetError::NotFound(name.to_string()),
            _ => DatasetError::Io {
                name: name.to_string(),
                message: e.to_string(),
            },
        })?;

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<Record>(line).map_err(|e| DatasetError::Parse {
                    name: name.to_string(),
                    line: i + 1,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn declared_columns(&self, name: &str) -> Result<Option<ColumnSet>, DatasetError> {
        self.path_for(name)?;
        Ok(self.schemas.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_file_accepts_both_shapes() {
        let schemas = parse_schemas(
            r#"{"sales": ["date", "revenue"], "costs": {"date": "string", "cost": "number"}}"#,
        )
        .unwrap();
        assert_eq!(schemas["sales"].names().to_vec(), vec!["date", "revenue"]);
        assert_eq!(schemas["costs"].names().to_vec(), vec!["date", "cost"]);
    }

    #[test]
    fn path_like_names_are_rejected() {
        let dir = NdjsonDirectory {
            root: PathBuf::from("data"),
            schemas: AHashMap::new(),
        };
        for name in ["../secret", "a/b", "a\\b", ".hidden", ""] {
            assert!(matches!(
                dir.path_for(name),
                Err(DatasetError::InvalidName(_))
            ));
        }
        assert!(dir.path_for("sales_2024").is_ok());
    }
}
