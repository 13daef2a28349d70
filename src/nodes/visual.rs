//! Terminal nodes: export and the chart family.
//!
//! None of them change the table. Charts additionally describe what to draw,
//! which the executor collects next to the node outputs.

use super::single_input;
use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform, OneOrMany};
use crate::table::{ColumnSet, Table, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExportConfig {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

pub const EXPORT_FORMATS: [&str; 3] = ["json", "ndjson", "csv"];

fn check_export(config: &NodeConfig) -> Result<(), ConfigError> {
    let config: ExportConfig = config.parse()?;
    if let Some(format) = &config.format {
        if !EXPORT_FORMATS.contains(&format.to_lowercase().as_str()) {
            return Err(invalid(
                "format",
                format!("unsupported export format '{}'", format),
            ));
        }
    }
    if config.filename.as_deref().is_some_and(|f| f.trim().is_empty()) {
        return Err(invalid("filename", "must not be empty"));
    }
    Ok(())
}

/// Marks a table for export; rows pass through unchanged.
pub struct Export;

impl NodeTransform for Export {
    fn node_type(&self) -> &str {
        "export"
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
        check_export(config)?;
        Ok(single_input(inputs)?.clone())
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        check_export(config)?;
        Ok(single_input(inputs)?.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Area,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Area,
    ];

    pub fn node_type(&self) -> &'static str {
        match self {
            ChartKind::Bar => "barchart",
            ChartKind::Line => "linechart",
            ChartKind::Pie => "piechart",
            ChartKind::Area => "areachart",
        }
    }
}

/// One plotted column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<Value>,
}

/// What a chart node asks a front end to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub x: String,
    pub labels: Vec<Value>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChartConfig {
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<OneOrMany<String>>,
    #[serde(default)]
    title: Option<String>,
}

/// A chart node of one kind.
pub struct ChartTransform {
    kind: ChartKind,
}

impl ChartTransform {
    pub fn new(kind: ChartKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ChartKind {
        self.kind
    }

    fn config(&self, config: &NodeConfig) -> Result<ChartConfig, ConfigError> {
        let parsed: ChartConfig = config.parse()?;
        let series = parsed.y.as_ref().map_or(0, |y| match y {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(list) => list.len(),
        });
        if self.kind == ChartKind::Pie && series > 1 {
            return Err(invalid("y", "a pie chart plots a single column"));
        }
        Ok(parsed)
    }

    fn build(&self, config: ChartConfig, table: &Table) -> Result<ChartDescriptor, TransformError> {
        let columns = table.columns();
        let x = match config.x {
            Some(x) => x,
            None => columns
                .iter()
                .next()
                .map(str::to_string)
                .ok_or_else(|| {
                    TransformError::Failed("a chart needs at least one column".to_string())
                })?,
        };
        let x_at = columns.require(&x)?;

        // Without explicit y columns, plot every other column holding only numbers.
        let y = match config.y {
            Some(y) => y.into_vec(),
            None => columns
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != x_at)
                .filter(|&(i, _)| {
                    table
                        .rows()
                        .iter()
                        .all(|row| matches!(row[i], Value::Number(_) | Value::Null))
                })
                .map(|(_, name)| name.to_string())
                .take(if self.kind == ChartKind::Pie { 1 } else { usize::MAX })
                .collect(),
        };

        let series = y
            .into_iter()
            .map(|name| {
                let at = columns.require(&name)?;
                Ok(ChartSeries {
                    values: table.rows().iter().map(|row| row[at].clone()).collect(),
                    name,
                })
            })
            .collect::<Result<Vec<_>, TransformError>>()?;

        Ok(ChartDescriptor {
            kind: self.kind,
            title: config.title,
            labels: table.rows().iter().map(|row| row[x_at].clone()).collect(),
            x,
            series,
        })
    }
}

impl NodeTransform for ChartTransform {
    fn node_type(&self) -> &str {
        self.kind.node_type()
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
        self.config(config)?;
        Ok(single_input(inputs)?.clone())
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        self.config(config)?;
        Ok(single_input(inputs)?.clone())
    }

    fn describe(
        &self,
        config: &NodeConfig,
        output: &Table,
    ) -> Option<Result<ChartDescriptor, TransformError>> {
        Some(
            self.config(config)
                .map_err(TransformError::from)
                .and_then(|parsed| self.build(parsed, output)),
        )
    }
}
