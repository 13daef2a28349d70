use super::{FlowIndex, ValidatedFlow};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Result of one pass of Kahn's algorithm.
pub(crate) struct Kahn {
    pub order: Vec<usize>,
    /// Nodes that never reached in-degree zero; non-empty iff the graph has a cycle.
    pub blocked: Vec<usize>,
}

/// Kahn's algorithm over node positions. Among ready nodes the smallest id
/// (byte-wise) is emitted first, so the order depends only on the graph.
pub(crate) fn kahn(index: &FlowIndex) -> Kahn {
    let mut in_degree: Vec<usize> = (0..index.len())
        .map(|p| index.predecessors(p).len())
        .collect();

    let mut ready: BinaryHeap<Reverse<(&str, usize)>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(p, _)| Reverse((index.id(p), p)))
        .collect();

    let mut order = Vec::with_capacity(index.len());
    while let Some(Reverse((_, position))) = ready.pop() {
        order.push(position);
        for &next in index.successors(position) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((index.id(next), next)));
            }
        }
    }

    let blocked = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d > 0)
        .map(|(p, _)| p)
        .collect();

    Kahn { order, blocked }
}

/// Recovers one cycle among the blocked nodes, as ids in edge order starting
/// from the smallest id.
pub(crate) fn find_cycle(index: &FlowIndex, blocked: &[usize]) -> Vec<String> {
    let mut is_blocked = vec![false; index.len()];
    for &p in blocked {
        is_blocked[p] = true;
    }

    // Every blocked node has a blocked predecessor, so walking backwards
    // must revisit a node.
    let Some(&start) = blocked.iter().min_by_key(|&&p| index.id(p)) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut visited_at = vec![None; index.len()];
    visited_at[start] = Some(0);
    let mut current = start;
    let cycle_start = loop {
        let Some(&previous) = index
            .predecessors(current)
            .iter()
            .filter(|&&p| is_blocked[p])
            .min_by_key(|&&p| index.id(p))
        else {
            break 0;
        };
        if let Some(at) = visited_at[previous] {
            break at;
        }
        visited_at[previous] = Some(path.len());
        path.push(previous);
        current = previous;
    };

    let mut cycle: Vec<usize> = path[cycle_start..].to_vec();
    cycle.reverse();
    if let Some(smallest) = (0..cycle.len()).min_by_key(|&i| index.id(cycle[i])) {
        cycle.rotate_left(smallest);
    }
    cycle.into_iter().map(|p| index.id(p).to_string()).collect()
}

/// The execution order of a validated flow, as node ids.
///
/// # Panics
///
/// Panics if the order misses a node. `ValidatedFlow` can only be built for
/// acyclic graphs, so this indicates a bug in the validator.
pub fn order(flow: &ValidatedFlow) -> Vec<String> {
    schedule(flow)
        .into_iter()
        .map(|p| flow.index().id(p).to_string())
        .collect()
}

pub(crate) fn schedule(flow: &ValidatedFlow) -> Vec<usize> {
    let Kahn { order, blocked } = kahn(flow.index());
    assert!(
        blocked.is_empty() && order.len() == flow.index().len(),
        "scheduler emitted {} of {} nodes for a validated flow",
        order.len(),
        flow.index().len()
    );
    order
}
