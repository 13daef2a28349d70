//! Common test utilities for building flow graphs and datasets.
use nagare::prelude::*;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

#[allow(dead_code)]
pub fn node(id: &str, node_type: &str, config: JsonValue) -> FlowNode {
    FlowNode::new(id, node_type, config)
}

#[allow(dead_code)]
pub fn edge(source: &str, target: &str) -> FlowEdge {
    FlowEdge::new(source, target)
}

#[allow(dead_code)]
pub fn graph(nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> FlowGraph {
    FlowGraph { nodes, edges }
}

/// A pass-through node of any registered one-input type, for structure-only tests.
#[allow(dead_code)]
pub fn passthrough(id: &str) -> FlowNode {
    node(id, "filter", json!({}))
}

#[allow(dead_code)]
pub fn source(id: &str, input: JsonValue) -> FlowNode {
    node(id, "datasource", json!({ "input": input }))
}

/// Four days of sales for two regions, with one missing amount.
#[allow(dead_code)]
pub fn sales_records() -> JsonValue {
    json!([
        {"date": "2024-01-01", "region": "north", "sales": 100, "units": 4},
        {"date": "2024-01-01", "region": "south", "sales": 80, "units": 3},
        {"date": "2024-01-02", "region": "north", "sales": 120, "units": 5},
        {"date": "2024-01-02", "region": "south", "sales": null, "units": 2},
        {"date": "2024-01-03", "region": "north", "sales": 90, "units": 4},
        {"date": "2024-01-04", "region": "south", "sales": 60, "units": 1}
    ])
}

#[allow(dead_code)]
pub fn region_records() -> JsonValue {
    json!([
        {"region": "north", "manager": "Aiko", "sales": 1},
        {"region": "south", "manager": "Ben", "sales": 2},
        {"region": "east", "manager": "Chen", "sales": 3}
    ])
}

/// The end-to-end scenario: one record grouped by date.
#[allow(dead_code)]
pub fn create_group_flow() -> FlowGraph {
    graph(
        vec![
            source("node1", json!([{"date": "2024-01-01", "sales": 100}])),
            node(
                "node2",
                "group",
                json!({"group_by": ["date"], "aggregations": ["sum", "mean"], "fields": ["sales"]}),
            ),
        ],
        vec![edge("node1", "node2")],
    )
}

/// Source -> filter -> sort -> group, plus a merge with a second source.
#[allow(dead_code)]
pub fn create_pipeline_flow() -> FlowGraph {
    graph(
        vec![
            source("sales", sales_records()),
            source("regions", region_records()),
            node(
                "recent",
                "filter",
                json!({"rules": [{"field": "date", "condition": "gte", "value": "2024-01-02"}]}),
            ),
            node("ordered", "sort", json!({"field": ["region", "date"]})),
            node("joined", "merge", json!({"how": "left", "on": "region"})),
            node(
                "by_region",
                "group",
                json!({"group_by": "region", "aggregations": ["sum", "count"], "fields": ["units"]}),
            ),
            node("chart", "barchart", json!({"x": "region", "y": "units_sum"})),
        ],
        vec![
            edge("sales", "recent"),
            edge("recent", "ordered"),
            FlowEdge::with_slot("ordered", "joined", 0),
            FlowEdge::with_slot("regions", "joined", 1),
            edge("ordered", "by_region"),
            edge("by_region", "chart"),
        ],
    )
}

#[allow(dead_code)]
pub fn engine() -> FlowEngine {
    FlowEngine::default()
}

#[allow(dead_code)]
pub fn engine_with_datasets(datasets: InMemoryDatasets) -> FlowEngine {
    FlowEngine::builder().with_datasets(Arc::new(datasets)).build()
}

#[allow(dead_code)]
pub fn names(columns: &ColumnSet) -> Vec<&str> {
    columns.iter().collect()
}
