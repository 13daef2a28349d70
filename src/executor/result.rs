use crate::flow::{AllowedFieldsLine, StepLine};
use crate::nodes::ChartDescriptor;
use crate::table::{ColumnSet, Table, TableSummary};
use ahash::AHashMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::ops::Index;

/// The outputs of one execution, keyed by node id, in execution order.
///
/// `T` is a `Table` for full execution and a `ColumnSet` for schema-only
/// execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult<T> {
    outputs: Vec<(String, T)>,
    positions: AHashMap<String, usize>,
    charts: Vec<(String, ChartDescriptor)>,
}

impl<T> Default for ExecutionResult<T> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            positions: AHashMap::new(),
            charts: Vec::new(),
        }
    }
}

impl<T> ExecutionResult<T> {
    pub(crate) fn push(&mut self, node_id: &str, output: T) {
        self.positions.insert(node_id.to_string(), self.outputs.len());
        self.outputs.push((node_id.to_string(), output));
    }

    pub(crate) fn push_chart(&mut self, node_id: &str, chart: ChartDescriptor) {
        self.charts.push((node_id.to_string(), chart));
    }

    pub fn get(&self, node_id: &str) -> Option<&T> {
        self.positions.get(node_id).map(|&i| &self.outputs[i].1)
    }

    /// Node ids in the order they ran.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outputs.iter().map(|(id, output)| (id.as_str(), output))
    }

    /// The output of the node that ran last.
    pub fn last(&self) -> Option<(&str, &T)> {
        self.outputs.last().map(|(id, output)| (id.as_str(), output))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Chart descriptors produced by visualization nodes, in execution order.
    pub fn charts(&self) -> impl Iterator<Item = (&str, &ChartDescriptor)> {
        self.charts.iter().map(|(id, chart)| (id.as_str(), chart))
    }

    pub fn chart(&self, node_id: &str) -> Option<&ChartDescriptor> {
        self.charts
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, chart)| chart)
    }

    pub fn into_outputs(self) -> Vec<(String, T)> {
        self.outputs
    }
}

impl<T: Serialize> ExecutionResult<T> {
    /// One `{"node_id", "output"}` JSON line per node, in execution order.
    pub fn ndjson_lines(&self) -> Result<Vec<String>, serde_json::Error> {
        self.iter()
            .map(|(node_id, output)| serde_json::to_string(&StepLine { node_id, output }))
            .collect()
    }
}

impl ExecutionResult<ColumnSet> {
    /// One `{"node_id", "allowed_fields"}` JSON line per node.
    pub fn allowed_fields_lines(&self) -> Result<Vec<String>, serde_json::Error> {
        self.iter()
            .map(|(node_id, allowed_fields)| {
                serde_json::to_string(&AllowedFieldsLine {
                    node_id,
                    allowed_fields,
                })
            })
            .collect()
    }
}

impl ExecutionResult<Table> {
    /// Projects a full result onto its column sets.
    pub fn columns(&self) -> ExecutionResult<ColumnSet> {
        let mut projected = ExecutionResult::default();
        for (id, table) in self.iter() {
            projected.push(id, table.columns().clone());
        }
        projected
    }

    /// Row counts, column names and inferred column types per node.
    pub fn summary(&self) -> ExecutionResult<TableSummary> {
        let mut summaries = ExecutionResult::default();
        for (id, table) in self.iter() {
            summaries.push(id, table.summary());
        }
        summaries
    }
}

impl<T> Index<&str> for ExecutionResult<T> {
    type Output = T;

    fn index(&self, node_id: &str) -> &T {
        match self.get(node_id) {
            Some(output) => output,
            None => panic!("no output for node '{}'", node_id),
        }
    }
}

impl<T: Serialize> Serialize for ExecutionResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.outputs.len()))?;
        for (id, output) in &self.outputs {
            map.serialize_entry(id, output)?;
        }
        map.end()
    }
}
