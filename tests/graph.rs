//! Validation and scheduling of flow graphs.
mod common;
use common::*;
use nagare::error::GraphError;
use nagare::prelude::*;
use serde_json::json;

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_valid_graph_passes() {
        let graph = create_pipeline_flow();
        let flow = engine().validate(&graph).expect("pipeline should validate");
        assert_eq!(flow.index().len(), graph.nodes.len());
    }

    #[test]
    fn test_duplicate_node_id() {
        let graph = graph(
            vec![source("a", json!([])), source("a", json!([]))],
            vec![],
        );
        let err = engine().validate(&graph).err().unwrap();
        assert_eq!(err, GraphError::DuplicateNode("a".to_string()));
    }

    #[test]
    fn test_dangling_edge() {
        let graph = graph(vec![source("a", json!([]))], vec![edge("a", "ghost")]);
        match engine().validate(&graph).err().unwrap() {
            GraphError::DanglingEdge {
                source_id,
                target_id,
                missing_node_id,
            } => {
                assert_eq!(source_id, "a");
                assert_eq!(target_id, "ghost");
                assert_eq!(missing_node_id, "ghost");
            }
            other => panic!("expected a dangling edge, got {:?}", other),
        }
    }

    #[test]
    fn test_two_node_cycle() {
        let graph = graph(
            vec![passthrough("a"), passthrough("b")],
            vec![edge("a", "b"), edge("b", "a")],
        );
        let err = engine().validate(&graph).err().unwrap();
        assert_eq!(
            err,
            GraphError::Cycle {
                nodes: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert_eq!(err.to_string(), "Flow contains a cycle: a -> b -> a");
    }

    #[test]
    fn test_cycle_is_reported_from_smallest_id_in_edge_order() {
        let graph = graph(
            vec![
                source("s", json!([])),
                passthrough("c"),
                passthrough("a"),
                passthrough("b"),
            ],
            vec![edge("s", "b"), edge("b", "c"), edge("c", "a"), edge("a", "b")],
        );
        let err = engine().validate(&graph).err().unwrap();
        assert_eq!(
            err,
            GraphError::Cycle {
                nodes: vec!["a".to_string(), "b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let graph = graph(vec![passthrough("a")], vec![edge("a", "a")]);
        assert!(matches!(
            engine().validate(&graph),
            Err(GraphError::Cycle { nodes }) if nodes == vec!["a".to_string()]
        ));
    }

    #[test]
    fn test_cycle_is_checked_before_node_types() {
        let graph = graph(
            vec![node("a", "teleport", json!({})), passthrough("b")],
            vec![edge("a", "b"), edge("b", "a")],
        );
        assert!(matches!(
            engine().validate(&graph),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn test_unknown_node_type() {
        let graph = graph(vec![node("x", "teleport", json!({}))], vec![]);
        assert_eq!(
            engine().validate(&graph).err().unwrap(),
            GraphError::UnknownNodeType {
                node_id: "x".to_string(),
                type_name: "teleport".to_string(),
            }
        );
    }

    #[test]
    fn test_node_types_match_case_insensitively() {
        let graph = graph(
            vec![
                node("a", " DataSource ", json!({"input": []})),
                node("b", "exampleData", json!({"input": []})),
            ],
            vec![],
        );
        assert!(engine().validate(&graph).is_ok());
    }

    #[test]
    fn test_input_arity() {
        let missing_input = graph(vec![passthrough("f")], vec![]);
        assert_eq!(
            engine().validate(&missing_input).err().unwrap(),
            GraphError::InputArity {
                node_id: "f".to_string(),
                expected: "exactly 1".to_string(),
                found: 0,
            }
        );

        let fed_source = graph(
            vec![source("a", json!([])), source("b", json!([]))],
            vec![edge("a", "b")],
        );
        assert!(matches!(
            engine().validate(&fed_source),
            Err(GraphError::InputArity { expected, found: 1, .. }) if expected == "no"
        ));

        let lonely_merge = graph(
            vec![source("a", json!([])), node("m", "merge", json!({"on": "id"}))],
            vec![edge("a", "m")],
        );
        assert!(matches!(
            engine().validate(&lonely_merge),
            Err(GraphError::InputArity { expected, .. }) if expected == "at least 2"
        ));
    }

    #[test]
    fn test_invalid_graph_runs_no_node() {
        // The source would fail on its unknown dataset if it ever ran.
        let graph = graph(
            vec![
                source("s", json!("missing")),
                passthrough("a"),
                passthrough("b"),
            ],
            vec![edge("s", "a"), edge("a", "b"), edge("b", "a")],
        );
        assert!(matches!(
            engine().execute(&graph),
            Err(ExecutionError::Graph(GraphError::Cycle { .. }))
        ));
        assert!(matches!(
            engine().execute_metadata(&graph),
            Err(ExecutionError::Graph(GraphError::Cycle { .. }))
        ));
    }
}

#[cfg(test)]
mod scheduler_tests {
    use super::*;

    fn position_of(order: &[String], id: &str) -> usize {
        order.iter().position(|n| n == id).unwrap()
    }

    #[test]
    fn test_independent_nodes_run_in_id_order() {
        let graph = graph(
            vec![
                source("z", json!([])),
                source("x", json!([])),
                source("y", json!([])),
            ],
            vec![],
        );
        assert_eq!(engine().order(&graph).unwrap(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_ready_nodes_are_taken_smallest_first() {
        let graph = graph(
            vec![
                passthrough("d"),
                node("c", "merge", json!({"index": true})),
                source("b", json!([])),
                source("a", json!([])),
                passthrough("e"),
            ],
            vec![
                edge("a", "c"),
                edge("b", "c"),
                edge("c", "d"),
                edge("a", "e"),
            ],
        );
        assert_eq!(engine().order(&graph).unwrap(), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_every_edge_points_forward() {
        let graph = create_pipeline_flow();
        let order = engine().order(&graph).unwrap();
        assert_eq!(order.len(), graph.nodes.len());
        for node in &graph.nodes {
            assert_eq!(order.iter().filter(|id| **id == node.id).count(), 1);
        }
        for edge in &graph.edges {
            assert!(position_of(&order, &edge.source) < position_of(&order, &edge.target));
        }
    }

    #[test]
    fn test_order_is_deterministic() {
        let graph = create_pipeline_flow();
        let engine = engine();
        let first = engine.order(&graph).unwrap();
        let second = engine.order(&graph).unwrap();
        assert_eq!(first, second);

        let result = engine.execute_metadata(&graph).unwrap();
        assert_eq!(result.order().collect::<Vec<_>>(), first);
    }

    #[test]
    fn test_order_ignores_declaration_order() {
        let mut graph = create_pipeline_flow();
        let expected = engine().order(&graph).unwrap();
        graph.nodes.reverse();
        graph.edges.reverse();
        assert_eq!(engine().order(&graph).unwrap(), expected);
    }
}
