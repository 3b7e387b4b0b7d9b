//! Semantic invariants not expressible via JSON Schema.

use std::collections::{HashMap, HashSet};

use super::graph::DependencyGraph;
use super::manifest::{MANIFEST_VERSION, Manifest};

/// Check manifest invariants:
/// - supported `version`
/// - no empty or duplicate ids
/// - non-empty source and artifact paths
pub fn validate_manifest_invariants(manifest: &Manifest) -> Vec<String> {
    let mut errors = Vec::new();
    if manifest.version != MANIFEST_VERSION {
        errors.push(format!(
            "unsupported manifest version {} (expected {})",
            manifest.version, MANIFEST_VERSION
        ));
    }

    let mut seen = HashSet::new();
    for (index, task) in manifest.tasks.iter().enumerate() {
        let label = if task.id.trim().is_empty() {
            errors.push(format!("tasks[{index}]: id must be non-empty"));
            format!("tasks[{index}]")
        } else {
            task.id.clone()
        };
        if !task.id.is_empty() && !seen.insert(task.id.as_str()) {
            errors.push(format!("duplicate id '{}'", task.id));
        }
        if task.source.trim().is_empty() {
            errors.push(format!("{label}: source must be non-empty"));
        }
        for (name, path) in [
            ("spec", &task.artifacts.spec),
            ("draft", &task.artifacts.draft),
            ("final", &task.artifacts.final_),
        ] {
            if path.trim().is_empty() {
                errors.push(format!("{label}: {name} artifact path must be non-empty"));
            }
        }
    }
    errors
}

/// Edges `a -> b` whose endpoints appear in `order` with `b` before `a`.
///
/// Nodes missing from `order` are ignored.
pub fn order_violations<'a>(order: &[&str], graph: &'a DependencyGraph) -> Vec<(&'a str, &'a str)> {
    let position: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    graph
        .edge_list()
        .into_iter()
        .filter(|(from, to)| match (position.get(from), position.get(to)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{ArtifactLayout, Task};
    use crate::core::types::{Role, TaskStatus};

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            source: format!("syntax/{id}.sps"),
            role: Role::Logic,
            status: TaskStatus::Pending,
            artifacts: ArtifactLayout::default().paths_for(id),
            attempts: 0,
            note: None,
        }
    }

    fn manifest(tasks: Vec<Task>) -> Manifest {
        Manifest {
            version: MANIFEST_VERSION,
            complete: true,
            warnings: Vec::new(),
            tasks,
        }
    }

    #[test]
    fn valid_manifest_has_no_errors() {
        assert!(validate_manifest_invariants(&manifest(vec![task("a"), task("b")])).is_empty());
    }

    #[test]
    fn reports_duplicates_and_empty_fields() {
        let mut empty = task("");
        empty.source = String::new();
        let mut blank_final = task("c");
        blank_final.artifacts.final_ = " ".to_string();

        let errors =
            validate_manifest_invariants(&manifest(vec![task("a"), task("a"), empty, blank_final]));
        assert!(errors.iter().any(|e| e == "duplicate id 'a'"));
        assert!(errors.iter().any(|e| e == "tasks[2]: id must be non-empty"));
        assert!(errors.iter().any(|e| e == "tasks[2]: source must be non-empty"));
        assert!(
            errors
                .iter()
                .any(|e| e == "c: final artifact path must be non-empty")
        );
    }

    #[test]
    fn finds_edges_that_run_backwards() {
        let mut graph = DependencyGraph::default();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        assert!(order_violations(&["a", "b", "c"], &graph).is_empty());
        assert_eq!(order_violations(&["b", "a", "c"], &graph), vec![("a", "b")]);
    }
}
