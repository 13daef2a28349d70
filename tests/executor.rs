//! Full and schema-only execution through `FlowEngine`.
mod common;
use common::*;
use nagare::error::DatasetError;
use nagare::nodes::ChartKind;
use nagare::prelude::*;
use serde_json::json;
use std::fs;
use std::sync::Arc;

/// Multiplies the `v` column by ten; columns pass through.
fn scale_engine() -> FlowEngine {
    let mut registry = NodeRegistry::with_defaults();
    registry.register_fn(
        "scale",
        Arity::Exactly(1),
        |_ctx, inputs, _config| {
            let input = inputs[0];
            let at = input.columns().require("v")?;
            let rows = input
                .rows()
                .iter()
                .map(|row| {
                    let mut row = row.clone();
                    if let Value::Number(n) = row[at] {
                        row[at] = Value::Number(n * 10.0);
                    }
                    row
                })
                .collect();
            Table::new(input.columns().clone(), rows)
        },
        |_ctx, inputs, _config| Ok(inputs[0].clone()),
    );
    FlowEngine::builder().with_registry(registry).build()
}

fn assert_modes_agree(engine: &FlowEngine, graph: &FlowGraph) {
    let full = engine.execute(graph).expect("full execution failed");
    let schema = engine
        .execute_metadata(graph)
        .expect("schema execution failed");
    assert_eq!(full.columns(), schema);
}

/// Emits a fixed single-row table, ignoring its config.
struct Constant;

impl NodeTransform for Constant {
    fn node_type(&self) -> &str {
        "Constant"
    }

    fn arity(&self) -> Arity {
        Arity::None
    }

    fn run(
        &self,
        ctx: &NodeContext,
        _inputs: &[&Table],
        _config: &NodeConfig,
    ) -> std::result::Result<Table, TransformError> {
        let columns = ColumnSet::from_names(["node", "answer"])?;
        Table::new(
            columns,
            vec![vec![Value::from(ctx.node_id), Value::Number(42.0)]],
        )
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        _inputs: &[&ColumnSet],
        _config: &NodeConfig,
    ) -> std::result::Result<ColumnSet, TransformError> {
        ColumnSet::from_names(["node", "answer"])
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_bad_config_is_reported_as_config_error() {
        let graph = graph(
            vec![
                source("src", sales_records()),
                node(
                    "f",
                    "filter",
                    json!({"rules": [{"field": "sales", "condition": "between", "value": 1}]}),
                ),
            ],
            vec![edge("src", "f")],
        );
        let err = engine().execute(&graph).err().unwrap();
        assert_eq!(err.node_id(), Some("f"));
        assert!(matches!(
            err,
            ExecutionError::Config {
                source: ConfigError::Invalid { ref key, .. },
                ..
            } if key == "condition"
        ));

        // Schema-only execution parses the same config.
        assert!(matches!(
            engine().execute_metadata(&graph),
            Err(ExecutionError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_column_fails_only_with_rows() {
        let graph = graph(
            vec![
                source("src", sales_records()),
                node(
                    "f",
                    "filter",
                    json!({"rules": [{"field": "price", "condition": "gt", "value": 1}]}),
                ),
            ],
            vec![edge("src", "f")],
        );
        match engine().execute(&graph) {
            Err(ExecutionError::Node { node_id, source }) => {
                assert_eq!(node_id, "f");
                assert_eq!(source, TransformError::MissingColumn("price".to_string()));
            }
            other => panic!("expected a node failure, got {:?}", other.map(|r| r.len())),
        }

        let columns = engine().execute_metadata(&graph).unwrap();
        assert_eq!(names(&columns["f"]), vec!["date", "region", "sales", "units"]);
    }

    #[test]
    fn test_error_messages_name_the_node() {
        let graph = graph(
            vec![source("src", json!("nowhere"))],
            vec![],
        );
        let err = engine().execute(&graph).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Node 'src' failed: Dataset 'nowhere' was not found"
        );
    }
}

#[cfg(test)]
mod mode_tests {
    use super::*;

    #[test]
    fn test_pipeline_outputs() {
        let result = engine().execute(&create_pipeline_flow()).unwrap();
        assert_eq!(result.len(), 7);

        let recent = &result["recent"];
        assert_eq!(recent.row_count(), 4);

        let ordered = &result["ordered"];
        let keys: Vec<String> = (0..ordered.row_count())
            .map(|i| {
                format!(
                    "{} {}",
                    ordered.value(i, "region").unwrap(),
                    ordered.value(i, "date").unwrap()
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                "north 2024-01-02",
                "north 2024-01-03",
                "south 2024-01-02",
                "south 2024-01-04"
            ]
        );

        let joined = &result["joined"];
        assert_eq!(
            names(joined.columns()),
            vec!["date", "region", "sales_x", "units", "manager", "sales_y"]
        );
        let managers: Vec<String> = (0..joined.row_count())
            .map(|i| joined.value(i, "manager").unwrap().to_string())
            .collect();
        assert_eq!(managers, vec!["Aiko", "Aiko", "Ben", "Ben"]);

        let by_region = &result["by_region"];
        assert_eq!(names(by_region.columns()), vec!["region", "units_sum", "units_count"]);
        assert_eq!(by_region.value(0, "units_sum"), Some(&Value::Number(9.0)));
        assert_eq!(by_region.value(1, "units_sum"), Some(&Value::Number(3.0)));
        assert_eq!(by_region.value(1, "units_count"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_schema_mode_matches_full_mode() {
        let engine = engine();
        for graph in [create_group_flow(), create_pipeline_flow()] {
            assert_modes_agree(&engine, &graph);
        }
    }

    #[test]
    fn test_modes_agree_for_single_input_nodes() {
        let mut nodes = vec![
            source("src", sales_records()),
            node("trend", "forecast", json!({"target": "sales", "horizon": 3})),
            node(
                "history",
                "forecast",
                json!({"target": "sales", "method": "naive", "horizon": 2, "combine": true}),
            ),
            node("flags", "anomaly", json!({"field": "units"})),
            node("spikes", "anomaly", json!({"field": "units", "method": "median_spike"})),
            node("out", "export", json!({"format": "csv", "filename": "sales.csv"})),
            node(
                "by_all",
                "group",
                json!({"group_by": "region", "aggregations": ["count", "first"]}),
            ),
            node("sizes", "group", json!({"group_by": ["region", "date"]})),
        ];
        for kind in ChartKind::ALL {
            nodes.push(node(
                kind.node_type(),
                kind.node_type(),
                json!({"x": "region", "y": "units"}),
            ));
        }
        let edges = nodes[1..].iter().map(|n| edge("src", &n.id)).collect();
        let graph = graph(nodes, edges);

        let engine = engine();
        assert_modes_agree(&engine, &graph);
        let schema = engine.execute_metadata(&graph).unwrap();
        assert_eq!(
            names(&schema["by_all"]),
            vec![
                "region",
                "date_count",
                "date_first",
                "sales_count",
                "sales_first",
                "units_count",
                "units_first"
            ]
        );
        assert_eq!(names(&schema["sizes"]), vec!["region", "date", "count"]);
        assert_eq!(names(&schema["history"]), vec!["date", "forecast", "source"]);
    }

    #[test]
    fn test_modes_agree_when_anomaly_columns_exist() {
        let graph = graph(
            vec![
                source(
                    "src",
                    json!([
                        {"v": 1, "anomaly_score": 0, "note": "a"},
                        {"v": 2, "anomaly_score": 0, "note": "b"},
                        {"v": 40, "anomaly_score": 0, "note": "c"}
                    ]),
                ),
                node("rescored", "anomaly", json!({"field": "v", "method": "iqr"})),
            ],
            vec![edge("src", "rescored")],
        );
        let engine = engine();
        assert_modes_agree(&engine, &graph);
        let schema = engine.execute_metadata(&graph).unwrap();
        assert_eq!(
            names(&schema["rescored"]),
            vec!["v", "anomaly_score", "note", "is_anomaly"]
        );
    }

    #[test]
    fn test_modes_agree_for_merges() {
        let third = json!([{"region": "north", "target": 5}, {"region": "west", "target": 1}]);
        let bosses = json!([{"area": "north", "boss": "Dana"}, {"area": "south", "boss": "Eli"}]);
        let graph = graph(
            vec![
                source("sales", sales_records()),
                source("regions", region_records()),
                source("targets", third),
                source("bosses", bosses),
                node("outer", "merge", json!({"on": "region", "how": "outer"})),
                node("by_row", "merge", json!({"index": true, "how": "left"})),
                node("three", "merge", json!({"on": "region", "how": "outer"})),
                node(
                    "renamed",
                    "merge",
                    json!({"left_on": "region", "right_on": "area", "how": "right"}),
                ),
            ],
            vec![
                FlowEdge::with_slot("sales", "outer", 0),
                FlowEdge::with_slot("regions", "outer", 1),
                FlowEdge::with_slot("sales", "by_row", 0),
                FlowEdge::with_slot("regions", "by_row", 1),
                FlowEdge::with_slot("sales", "three", 0),
                FlowEdge::with_slot("regions", "three", 1),
                FlowEdge::with_slot("targets", "three", 2),
                FlowEdge::with_slot("sales", "renamed", 0),
                FlowEdge::with_slot("bosses", "renamed", 1),
            ],
        );
        let engine = engine();
        assert_modes_agree(&engine, &graph);
        let schema = engine.execute_metadata(&graph).unwrap();
        assert_eq!(
            names(&schema["three"]),
            vec!["date", "region", "sales_1", "units", "manager", "sales_2", "target"]
        );
        assert_eq!(
            names(&schema["renamed"]),
            vec!["date", "region", "sales", "units", "area", "boss"]
        );
    }

    #[test]
    fn test_modes_agree_for_every_inline_source_shape() {
        let graph = graph(
            vec![
                source("columnar", json!({"day": ["mon", "tue"], "visits": [3, 5]})),
                source("single", json!({"id": 7, "meta": {"owner": "kim"}})),
                source(
                    "nested",
                    json!([
                        {"id": 1, "geo": {"city": "Oslo"}},
                        {"id": 2, "geo": {"city": "Bergen", "zip": "5003"}, "extra": true}
                    ]),
                ),
            ],
            vec![],
        );
        let engine = engine();
        assert_modes_agree(&engine, &graph);
        let schema = engine.execute_metadata(&graph).unwrap();
        assert_eq!(names(&schema["single"]), vec!["id", "meta.owner"]);
        assert_eq!(names(&schema["nested"]), vec!["id", "geo.city", "geo.zip", "extra"]);
    }

    #[test]
    fn test_schema_mode_reads_no_rows() {
        // Column names come from the plan alone; `region` and `sales` are
        // never looked up.
        let graph = graph(
            vec![
                source("src", json!([])),
                node(
                    "g",
                    "group",
                    json!({"group_by": "region", "aggregations": "sum", "fields": "sales"}),
                ),
            ],
            vec![edge("src", "g")],
        );
        let schema = engine().execute_metadata(&graph).unwrap();
        assert!(schema["src"].is_empty());
        assert_eq!(names(&schema["g"]), vec!["region", "sales_sum"]);
    }

    #[test]
    fn test_allowed_fields() {
        let allowed = engine().allowed_fields(&create_pipeline_flow()).unwrap();
        assert!(allowed["sales"].is_empty());
        assert!(allowed["regions"].is_empty());
        assert_eq!(names(&allowed["recent"]), vec!["date", "region", "sales", "units"]);
        // The first input of a merge is the slot-0 edge.
        assert_eq!(names(&allowed["joined"]), vec!["date", "region", "sales", "units"]);
        assert_eq!(
            names(&allowed["chart"]),
            vec!["region", "units_sum", "units_count"]
        );
    }

    #[test]
    fn test_chart_descriptor_is_collected() {
        let result = engine().execute(&create_pipeline_flow()).unwrap();
        let chart = result.chart("chart").expect("chart descriptor");
        assert_eq!(chart.x, "region");
        assert_eq!(chart.labels, vec![Value::from("north"), Value::from("south")]);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].name, "units_sum");
        assert_eq!(
            chart.series[0].values,
            vec![Value::Number(9.0), Value::Number(3.0)]
        );
        assert!(result.chart("joined").is_none());

        let schema = engine().execute_metadata(&create_pipeline_flow()).unwrap();
        assert_eq!(schema.charts().count(), 0);
    }

    #[test]
    fn test_concurrent_executions_share_one_engine() {
        let engine = engine();
        let graph = create_pipeline_flow();
        let expected = engine.execute(&graph).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| engine.execute(&graph)))
                .collect();
            for handle in handles {
                let result = handle.join().expect("thread panicked").unwrap();
                assert_eq!(result, expected);
            }
        });
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn test_closure_registered_node_type() {
        let graph = graph(
            vec![
                source("src", json!([{"v": 1}, {"v": 2.5}, {"v": null}])),
                node("x", "SCALE", json!({})),
            ],
            vec![edge("src", "x")],
        );
        let engine = scale_engine();
        let result = engine.execute(&graph).unwrap();
        let values: Vec<&Value> = result["x"].column("v").unwrap();
        assert_eq!(
            values,
            vec![&Value::Number(10.0), &Value::Number(25.0), &Value::Null]
        );
        assert_eq!(names(&engine.execute_metadata(&graph).unwrap()["x"]), vec!["v"]);
        assert!(engine.registry().contains("filter"));
    }

    #[test]
    fn test_custom_transform_gets_its_node_id() {
        let engine = FlowEngine::builder()
            .with_transform(Arc::new(Constant))
            .build();
        let graph = graph(vec![node("answer_node", "constant", json!({}))], vec![]);
        let result = engine.execute(&graph).unwrap();
        assert_eq!(
            result["answer_node"].value(0, "node"),
            Some(&Value::from("answer_node"))
        );
    }

    #[test]
    fn test_type_mapping() {
        let engine = FlowEngine::builder()
            .with_type_mapping("Spreadsheet", "datasource")
            .with_type_mapping("ghost", "teleport")
            .build();

        let mapped = graph(vec![node("s", "spreadsheet", json!({"input": [{"a": 1}]}))], vec![]);
        assert_eq!(engine.execute(&mapped).unwrap()["s"].row_count(), 1);

        let unmapped = graph(vec![node("g", "ghost", json!({}))], vec![]);
        assert!(matches!(
            engine.execute(&unmapped),
            Err(ExecutionError::Graph(GraphError::UnknownNodeType { .. }))
        ));
    }

    #[test]
    fn test_empty_registry_knows_no_types() {
        let engine = FlowEngine::builder()
            .with_registry(NodeRegistry::new())
            .build();
        assert!(matches!(
            engine.execute(&create_group_flow()),
            Err(ExecutionError::Graph(GraphError::UnknownNodeType { .. }))
        ));
    }
}

#[cfg(test)]
mod dataset_tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("nagare-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_ndjson_directory_source() {
        let dir = scratch_dir("ndjson");
        fs::write(
            dir.join("costs.ndjson"),
            concat!(
                "{\"date\": \"2024-01-01\", \"cost\": 10}\n\n",
                "{\"date\": \"2024-01-02\", \"cost\": 12, \"note\": \"late\"}\n",
            ),
        )
        .unwrap();

        let datasets = NdjsonDirectory::open(&dir).unwrap();
        let engine = FlowEngine::builder().with_datasets(Arc::new(datasets)).build();
        let graph = graph(vec![source("src", json!("costs"))], vec![]);

        let result = engine.execute(&graph).unwrap();
        assert_eq!(result["src"].row_count(), 2);
        assert_eq!(names(result["src"].columns()), vec!["date", "cost", "note"]);
        assert_eq!(result["src"].value(0, "note"), Some(&Value::Null));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_schema_file_answers_metadata_requests() {
        let dir = scratch_dir("schema");
        fs::write(
            dir.join("schemas.json"),
            r#"{"costs": {"date": "date", "cost": "number"}}"#,
        )
        .unwrap();
        // No data file: schema mode must not need one.
        let engine = FlowEngine::builder()
            .with_datasets(Arc::new(NdjsonDirectory::open(&dir).unwrap()))
            .build();
        let graph = graph(vec![source("src", json!("costs"))], vec![]);

        let columns = engine.execute_metadata(&graph).unwrap();
        assert_eq!(names(&columns["src"]), vec!["date", "cost"]);
        assert!(matches!(
            engine.execute(&graph),
            Err(ExecutionError::Node {
                source: TransformError::Dataset(DatasetError::NotFound(_)),
                ..
            })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_declared_schema_order_wins_in_both_modes() {
        let dir = scratch_dir("sorted-schema");
        fs::write(
            dir.join("sales.ndjson"),
            "{\"date\": \"2024-01-01\", \"sales\": 100, \"region\": \"north\"}\n\
             {\"date\": \"2024-01-02\", \"sales\": 80}\n",
        )
        .unwrap();
        // Written with sorted keys, so the order differs from the records.
        fs::write(
            dir.join("schemas.json"),
            r#"{"sales": {"date": "timestamp", "region": "str", "sales": "int"}}"#,
        )
        .unwrap();
        let engine = FlowEngine::builder()
            .with_datasets(Arc::new(NdjsonDirectory::open(&dir).unwrap()))
            .build();
        let graph = graph(
            vec![
                source("src", json!("sales")),
                node("top", "sort", json!({"field": "sales", "asc": false})),
            ],
            vec![edge("src", "top")],
        );

        let full = engine.execute(&graph).unwrap();
        let schema = engine.execute_metadata(&graph).unwrap();
        assert_eq!(full.columns(), schema);
        assert_eq!(names(&schema["src"]), vec!["date", "region", "sales"]);
        assert_eq!(full["src"].value(0, "region"), Some(&Value::from("north")));
        assert_eq!(full["src"].value(1, "region"), Some(&Value::Null));
        assert_eq!(full["top"].value(0, "sales"), Some(&Value::Number(100.0)));

        fs::write(dir.join("schemas.json"), r#"{"sales": ["date", "sales"]}"#).unwrap();
        let engine = FlowEngine::builder()
            .with_datasets(Arc::new(NdjsonDirectory::open(&dir).unwrap()))
            .build();
        assert!(matches!(
            engine.execute(&graph),
            Err(ExecutionError::Node {
                source: TransformError::Dataset(DatasetError::UndeclaredColumn { column, .. }),
                ..
            }) if column == "region"
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_path_like_dataset_names_are_refused() {
        let dir = scratch_dir("names");
        let engine = FlowEngine::builder()
            .with_datasets(Arc::new(NdjsonDirectory::open(&dir).unwrap()))
            .build();
        let graph = graph(vec![source("src", json!("../etc/passwd"))], vec![]);
        assert!(matches!(
            engine.execute_metadata(&graph),
            Err(ExecutionError::Node {
                source: TransformError::Dataset(DatasetError::InvalidName(_)),
                ..
            })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}

#[cfg(test)]
mod output_tests {
    use super::*;

    #[test]
    fn test_ndjson_lines() {
        let result = engine().execute(&create_group_flow()).unwrap();
        let lines = result.ndjson_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"node_id":"node1","output":{"columns":["date","sales"],"rows":[{"date":"2024-01-01","sales":100}]}}"#
        );
        let second: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["node_id"], "node2");
        assert_eq!(
            second["output"]["rows"][0],
            json!({"date": "2024-01-01", "sales_sum": 100, "sales_mean": 100})
        );
    }

    #[test]
    fn test_allowed_fields_lines() {
        let allowed = engine().allowed_fields(&create_group_flow()).unwrap();
        assert_eq!(
            allowed.allowed_fields_lines().unwrap(),
            vec![
                r#"{"node_id":"node1","allowed_fields":[]}"#.to_string(),
                r#"{"node_id":"node2","allowed_fields":["date","sales"]}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_summary_reports_counts_and_types() {
        let result = engine().execute(&create_group_flow()).unwrap();
        let summary = result.summary();
        assert_eq!(summary.order().collect::<Vec<_>>(), vec!["node1", "node2"]);
        assert_eq!(
            serde_json::to_value(&summary["node2"]).unwrap(),
            json!({
                "total_rows": 1,
                "column_names": ["date", "sales_sum", "sales_mean"],
                "column_types": ["timestamp", "int", "int"]
            })
        );
        assert_eq!(summary["node1"].total_rows, 1);
        assert_eq!(summary["node1"].column_types, vec![ColumnKind::Timestamp, ColumnKind::Int]);

        let lines = summary.ndjson_lines().unwrap();
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["output"]["column_names"], json!(["date", "sales"]));
    }

    #[test]
    fn test_result_serializes_in_execution_order() {
        let schema = engine().execute_metadata(&create_pipeline_flow()).unwrap();
        let text = serde_json::to_string(&schema).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&str> = parsed
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, schema.order().collect::<Vec<_>>());
        assert_eq!(parsed["by_region"], json!(["region", "units_sum", "units_count"]));
    }
}
