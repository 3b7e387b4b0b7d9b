//! Deterministic topological scheduling (Kahn's algorithm).

use std::collections::{BTreeMap, BTreeSet};

use super::graph::{DependencyGraph, GraphWarning};

/// Linear execution order produced by [`schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Every node of the graph exactly once.
    pub order: Vec<String>,
    /// Nodes that could not be ordered (cycle members or nodes blocked by them),
    /// appended to `order` in lexicographic order.
    pub unordered: Vec<String>,
}

impl Schedule {
    pub fn is_complete(&self) -> bool {
        self.unordered.is_empty()
    }

    pub fn warning(&self) -> Option<GraphWarning> {
        (!self.is_complete()).then(|| GraphWarning::Cycle {
            units: self.unordered.clone(),
        })
    }
}

/// Order the graph so that for every edge `a -> b`, `a` comes first.
///
/// Ties between ready nodes break lexicographically, so the result is stable
/// across runs. A cycle never aborts scheduling: the ordered prefix is kept and
/// the leftovers are appended.
pub fn schedule(graph: &DependencyGraph) -> Schedule {
    let mut in_degree: BTreeMap<&str, usize> =
        graph.nodes().map(|n| (n, graph.in_degree(n))).collect();
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        for next in graph.successors(node) {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
    let unordered: Vec<String> = graph
        .nodes()
        .filter(|node| !placed.contains(node))
        .map(str::to_string)
        .collect();
    order.extend(unordered.iter().cloned());

    Schedule { order, unordered }
}
