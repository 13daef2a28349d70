use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform, OneOrMany};
use crate::table::{ColumnSet, Table, Value};
use ahash::{AHashMap, AHashSet};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MergeConfig {
    #[serde(default)]
    how: Option<String>,
    #[serde(default)]
    on: Option<OneOrMany<String>>,
    #[serde(default)]
    left_on: Option<OneOrMany<String>>,
    #[serde(default)]
    right_on: Option<OneOrMany<String>>,
    #[serde(default)]
    index: bool,
    #[serde(default)]
    suffixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum How {
    Inner,
    Left,
    Right,
    Outer,
}

impl How {
    fn parse(name: Option<&str>) -> Result<Self, ConfigError> {
        let Some(name) = name else {
            return Ok(How::Inner);
        };
        match name.trim().to_lowercase().as_str() {
            "inner" => Ok(How::Inner),
            "left" => Ok(How::Left),
            "right" => Ok(How::Right),
            "outer" | "full" => Ok(How::Outer),
            other => Err(invalid("how", format!("unknown join type '{}'", other))),
        }
    }

    fn keeps_unmatched_left(&self) -> bool {
        matches!(self, How::Left | How::Outer)
    }

    fn keeps_unmatched_right(&self) -> bool {
        matches!(self, How::Right | How::Outer)
    }
}

/// How rows of different inputs are matched.
#[derive(Debug, Clone, PartialEq)]
enum JoinKeys {
    /// The same key columns in every input.
    On(Vec<String>),
    /// Differently named key columns in exactly two inputs.
    Columns { left: Vec<String>, right: Vec<String> },
    /// Row position.
    Index,
}

#[derive(Debug, Clone)]
struct MergeSettings {
    how: How,
    keys: JoinKeys,
    suffixes: Vec<String>,
}

fn non_empty(key: &str, list: OneOrMany<String>) -> Result<Vec<String>, ConfigError> {
    let list = list.into_vec();
    if list.is_empty() {
        Err(invalid(key, "at least one key column is required"))
    } else {
        Ok(list)
    }
}

fn parse(config: &NodeConfig, input_count: usize) -> Result<MergeSettings, ConfigError> {
    let config: MergeConfig = config.parse()?;
    let how = How::parse(config.how.as_deref())?;

    let keys = match (config.on, config.left_on, config.right_on, config.index) {
        (Some(on), None, None, false) => JoinKeys::On(non_empty("on", on)?),
        (None, Some(left), Some(right), false) => {
            let left = non_empty("left_on", left)?;
            let right = non_empty("right_on", right)?;
            if left.len() != right.len() {
                return Err(invalid(
                    "right_on",
                    "'left_on' and 'right_on' must name the same number of columns",
                ));
            }
            if input_count != 2 {
                return Err(invalid(
                    "left_on",
                    format!("'left_on'/'right_on' join exactly two inputs, got {}", input_count),
                ));
            }
            JoinKeys::Columns { left, right }
        }
        (None, None, None, true) => JoinKeys::Index,
        _ => {
            return Err(invalid(
                "on",
                "give exactly one of 'on', 'left_on' with 'right_on', or 'index: true'",
            ));
        }
    };

    let suffixes = match config.suffixes {
        Some(suffixes) if suffixes.len() == input_count => suffixes,
        Some(suffixes) => {
            return Err(invalid(
                "suffixes",
                format!("{} suffixes given for {} inputs", suffixes.len(), input_count),
            ));
        }
        None if input_count == 2 => vec!["_x".to_string(), "_y".to_string()],
        None => (1..=input_count).map(|i| format!("_{}", i)).collect(),
    };

    Ok(MergeSettings {
        how,
        keys,
        suffixes,
    })
}

/// Where an output cell comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    /// The `n`-th component of the row's join key.
    Key(usize),
    /// A column of one input; null when that input has no row here.
    Column { input: usize, index: usize },
}

#[derive(Debug, Clone)]
struct MergePlan {
    columns: ColumnSet,
    cells: Vec<Cell>,
}

impl MergeSettings {
    /// Key columns rendered once from the join key: the first input's key
    /// columns, plus which later inputs drop their copy.
    fn shared_key(&self, input: usize, name: &str) -> Option<usize> {
        match &self.keys {
            JoinKeys::On(keys) => keys.iter().position(|k| k == name),
            JoinKeys::Columns { left, right } => {
                let side = if input == 0 { left } else { right };
                side.iter()
                    .position(|k| k == name)
                    .filter(|&j| left[j] == right[j])
            }
            JoinKeys::Index => None,
        }
    }

    fn plan(&self, inputs: &[&ColumnSet]) -> Result<MergePlan, TransformError> {
        // (input, column index, name, rendered-from-key)
        let mut kept: Vec<(usize, usize, &str, Option<usize>)> = Vec::new();
        for (input, columns) in inputs.iter().enumerate() {
            for (index, name) in columns.iter().enumerate() {
                match self.shared_key(input, name) {
                    Some(_) if input > 0 => {}
                    key => kept.push((input, index, name, key)),
                }
            }
        }

        let mut owners: AHashMap<&str, AHashSet<usize>> = AHashMap::new();
        for &(input, _, name, _) in &kept {
            owners.entry(name).or_default().insert(input);
        }

        let mut columns = ColumnSet::new();
        let mut cells = Vec::with_capacity(kept.len());
        for (input, index, name, key) in kept {
            if owners.get(name).is_some_and(|o| o.len() > 1) {
                columns.push(format!("{}{}", name, self.suffixes[input]))?;
            } else {
                columns.push(name)?;
            }
            cells.push(match key {
                Some(j) => Cell::Key(j),
                None => Cell::Column { input, index },
            });
        }
        Ok(MergePlan { columns, cells })
    }

    /// Key column positions in one input, by join key component.
    fn key_positions(
        &self,
        input: usize,
        columns: &ColumnSet,
    ) -> Result<Vec<usize>, TransformError> {
        let names = match &self.keys {
            JoinKeys::On(keys) => keys,
            JoinKeys::Columns { left, right } => {
                if input == 0 {
                    left
                } else {
                    right
                }
            }
            JoinKeys::Index => return Ok(Vec::new()),
        };
        names.iter().map(|k| columns.require(k)).collect()
    }

    fn row_key(&self, table: &Table, positions: &[usize], row: usize) -> Vec<Value> {
        match self.keys {
            JoinKeys::Index => vec![Value::Number(row as f64)],
            _ => positions.iter().map(|&p| table.rows()[row][p].clone()).collect(),
        }
    }
}

/// A joined row in progress: its key and the row it takes from each input so far.
struct Joined {
    key: Vec<Value>,
    members: Vec<Option<usize>>,
}

fn matchable(key: &[Value]) -> bool {
    key.iter().all(|v| !v.is_null())
}

/// Joins two or more inputs left to right on key columns or row position.
pub struct Merge;

impl NodeTransform for Merge {
    fn node_type(&self) -> &str {
        "merge"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }

    fn run(
        &self,
        _ctx: &NodeContext,
        inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError> {
        let settings = parse(config, inputs.len())?;
        let column_sets: Vec<&ColumnSet> = inputs.iter().map(|t| t.columns()).collect();
        let plan = settings.plan(&column_sets)?;
        let positions = inputs
            .iter()
            .enumerate()
            .map(|(i, t)| settings.key_positions(i, t.columns()))
            .collect::<Result<Vec<_>, _>>()?;

        let Some((first, rest)) = inputs.split_first() else {
            return Ok(Table::empty(plan.columns));
        };
        let mut joined: Vec<Joined> = (0..first.row_count())
            .map(|row| Joined {
                key: settings.row_key(first, &positions[0], row),
                members: vec![Some(row)],
            })
            .collect();

        for (offset, right) in rest.iter().enumerate() {
            let input = offset + 1;
            let right_keys: Vec<Vec<Value>> = (0..right.row_count())
                .map(|row| settings.row_key(right, &positions[input], row))
                .collect();
            let mut lookup: AHashMap<&[Value], Vec<usize>> = AHashMap::new();
            for (row, key) in right_keys.iter().enumerate() {
                if matchable(key) {
                    lookup.entry(key.as_slice()).or_default().push(row);
                }
            }

            let mut matched = vec![false; right.row_count()];
            let mut next = Vec::with_capacity(joined.len());
            for row in joined {
                let hits = if matchable(&row.key) {
                    lookup.get(row.key.as_slice())
                } else {
                    None
                };
                match hits {
                    Some(hits) => {
                        for &hit in hits {
                            matched[hit] = true;
                            let mut members = row.members.clone();
                            members.push(Some(hit));
                            next.push(Joined {
                                key: row.key.clone(),
                                members,
                            });
                        }
                    }
                    None if settings.how.keeps_unmatched_left() => {
                        let mut members = row.members;
                        members.push(None);
                        next.push(Joined {
                            key: row.key,
                            members,
                        });
                    }
                    None => {}
                }
            }
            if settings.how.keeps_unmatched_right() {
                for (hit, key) in right_keys.iter().enumerate() {
                    if !matched[hit] {
                        let mut members = vec![None; input];
                        members.push(Some(hit));
                        next.push(Joined {
                            key: key.clone(),
                            members,
                        });
                    }
                }
            }
            joined = next;
        }

        let rows = joined
            .into_iter()
            .map(|row| {
                plan.cells
                    .iter()
                    .map(|cell| match *cell {
                        Cell::Key(j) => row.key.get(j).cloned().unwrap_or(Value::Null),
                        Cell::Column { input, index } => row.members[input]
                            .map_or(Value::Null, |r| inputs[input].rows()[r][index].clone()),
                    })
                    .collect()
            })
            .collect();
        Table::new(plan.columns, rows)
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        let settings = parse(config, inputs.len())?;
        Ok(settings.plan(inputs)?.columns)
    }
}
