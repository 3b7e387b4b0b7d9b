//! Dependency graph construction over source units.
//!
//! Edges point in execution direction: `a -> b` means `a` must run before `b`.
//! A unit that references another unit therefore receives an edge *from* the
//! referenced unit. Consecutive references made by one caller also produce a
//! sequential sibling edge (`first -> second`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;

/// Immutable named input artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// File name as found on disk (e.g. `01_Calc_Delays.sps`).
    pub name: String,
    /// Case-insensitive identity key (lowercased file name).
    pub key: String,
    /// Path of the unit relative to the project root, `/`-separated.
    pub path: String,
    pub content: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.to_lowercase(),
            name,
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Non-fatal problem found while building or scheduling the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// A reference names a unit that does not exist.
    UnresolvedReference { caller: String, target: String },
    /// A unit references itself; the edge is dropped.
    SelfReference { unit: String },
    /// Units left over by the scheduler (cycle or unreachable subset).
    Cycle { units: Vec<String> },
    /// Two units share a case-insensitive key; only the first is planned.
    DuplicateUnit { kept: String, dropped: String },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::UnresolvedReference { caller, target } => {
                write!(f, "{caller}: unresolved reference to '{target}'")
            }
            GraphWarning::SelfReference { unit } => write!(f, "{unit}: references itself"),
            GraphWarning::Cycle { units } => write!(
                f,
                "cycle or unordered units appended in fallback order: {}",
                units.join(", ")
            ),
            GraphWarning::DuplicateUnit { kept, dropped } => {
                write!(f, "{dropped}: same name as {kept} ignoring case; skipped")
            }
        }
    }
}

/// Extracts explicit reference directives from unit content.
#[derive(Debug, Clone)]
pub struct ReferenceScanner {
    pattern: Regex,
}

impl ReferenceScanner {
    /// Build a scanner from a regex whose first capture group names the target.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Referenced targets in order of appearance, reduced to lowercased base names.
    pub fn references(&self, content: &str) -> Vec<String> {
        self.pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| base_name(m.as_str()))
            .filter(|target| !target.is_empty())
            .collect()
    }
}

fn base_name(raw: &str) -> String {
    raw.trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn stem(key: &str) -> &str {
    key.rsplit_once('.').map_or(key, |(stem, _)| stem)
}

/// Directed graph over unit keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<String, BTreeSet<String>>,
    in_degree: BTreeMap<String, usize>,
    callers: BTreeSet<String>,
    warnings: Vec<GraphWarning>,
}

impl DependencyGraph {
    pub fn add_node(&mut self, key: &str) {
        if self.nodes.insert(key.to_string()) {
            self.in_degree.entry(key.to_string()).or_insert(0);
        }
    }

    /// Insert `from -> to`. Returns `false` when the edge already existed.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        self.add_node(from);
        self.add_node(to);
        let inserted = self
            .edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        if inserted {
            *self.in_degree.entry(to.to_string()).or_insert(0) += 1;
        }
        inserted
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Successors of `node` in lexicographic order.
    pub fn successors(&self, node: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(node)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    pub fn in_degree(&self, node: &str) -> usize {
        self.in_degree.get(node).copied().unwrap_or(0)
    }

    /// All edges sorted by `(from, to)`.
    pub fn edge_list(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (from.as_str(), to.as_str())))
            .collect()
    }

    /// True if the unit contains at least one reference directive.
    pub fn references_others(&self, node: &str) -> bool {
        self.callers.contains(node)
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }
}

/// Build the dependency graph for `units`.
///
/// Unresolvable and self references are dropped with a warning. When two
/// units share a key, the first one wins and the other is reported.
pub fn build_graph(units: &[SourceUnit], scanner: &ReferenceScanner) -> DependencyGraph {
    let mut graph = DependencyGraph::default();
    let mut first_by_key: BTreeMap<&str, &SourceUnit> = BTreeMap::new();
    let mut planned = Vec::with_capacity(units.len());
    for unit in units {
        if let Some(kept) = first_by_key.get(unit.key.as_str()) {
            graph.warnings.push(GraphWarning::DuplicateUnit {
                kept: kept.name.clone(),
                dropped: unit.name.clone(),
            });
            continue;
        }
        first_by_key.insert(&unit.key, unit);
        graph.add_node(&unit.key);
        planned.push(unit);
    }
    let keys: BTreeSet<&str> = first_by_key.keys().copied().collect();

    for unit in planned {
        let references = scanner.references(&unit.content);
        if !references.is_empty() {
            graph.callers.insert(unit.key.clone());
        }

        let mut previous: Option<String> = None;
        for raw_target in references {
            let Some(target) = resolve(&keys, &raw_target) else {
                graph.warnings.push(GraphWarning::UnresolvedReference {
                    caller: unit.key.clone(),
                    target: raw_target,
                });
                continue;
            };
            if target == unit.key {
                graph.warnings.push(GraphWarning::SelfReference {
                    unit: unit.key.clone(),
                });
                continue;
            }

            graph.add_edge(&target, &unit.key);
            if let Some(prev) = previous.as_deref()
                && prev != target
            {
                graph.add_edge(prev, &target);
            }
            previous = Some(target);
        }
    }

    graph
}

fn resolve(keys: &BTreeSet<&str>, target: &str) -> Option<String> {
    if keys.contains(target) {
        return Some(target.to_string());
    }
    keys.iter()
        .find(|key| stem(key) == target)
        .map(|key| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = r#"(?im)^\s*(?:INSERT|INCLUDE)\s+FILE\s*=\s*['"]?([^'"\s]+)['"]?"#;

    fn scanner() -> ReferenceScanner {
        ReferenceScanner::new(PATTERN).expect("pattern")
    }

    fn unit(name: &str, content: &str) -> SourceUnit {
        SourceUnit::new(name, format!("syntax/{name}"), content)
    }

    #[test]
    fn scanner_reduces_paths_to_lowercase_base_names() {
        let refs = scanner().references(
            "INSERT FILE='lib/A.sps'.\n  include file = \"C:\\x\\B.SPS\".\nCOMPUTE x = 1.\n",
        );
        assert_eq!(refs, vec!["a.sps".to_string(), "b.sps".to_string()]);
    }

    #[test]
    fn caller_gets_edges_from_targets_and_siblings_are_chained() {
        let units = vec![
            unit("a.sps", "COMPUTE x = 1."),
            unit("b.sps", "INSERT FILE='a.sps'.\nINSERT FILE='c.sps'."),
            unit("c.sps", "COMPUTE y = 2."),
        ];
        let graph = build_graph(&units, &scanner());

        assert_eq!(
            graph.edge_list(),
            vec![("a.sps", "b.sps"), ("a.sps", "c.sps"), ("c.sps", "b.sps")]
        );
        assert_eq!(graph.in_degree("b.sps"), 2);
        assert_eq!(graph.in_degree("c.sps"), 1);
        assert!(graph.references_others("b.sps"));
        assert!(!graph.references_others("a.sps"));
    }

    #[test]
    fn duplicate_references_do_not_double_in_degree() {
        let units = vec![
            unit("a.sps", ""),
            unit("m.sps", "INSERT FILE='a.sps'.\nINSERT FILE='a.sps'."),
        ];
        let graph = build_graph(&units, &scanner());
        assert_eq!(graph.in_degree("m.sps"), 1);
        assert_eq!(graph.edge_list(), vec![("a.sps", "m.sps")]);
    }

    #[test]
    fn unresolved_and_self_references_become_warnings() {
        let units = vec![unit("m.sps", "INSERT FILE='ghost.sps'.\nINSERT FILE='m.sps'.")];
        let graph = build_graph(&units, &scanner());

        assert!(graph.edge_list().is_empty());
        assert_eq!(
            graph.warnings(),
            &[
                GraphWarning::UnresolvedReference {
                    caller: "m.sps".to_string(),
                    target: "ghost.sps".to_string(),
                },
                GraphWarning::SelfReference {
                    unit: "m.sps".to_string(),
                },
            ]
        );
        assert!(graph.references_others("m.sps"));
    }

    #[test]
    fn references_resolve_case_insensitively_and_without_extension() {
        let units = vec![
            SourceUnit::new("Calc.SPS", "syntax/Calc.SPS", ""),
            unit("main.sps", "INCLUDE FILE=calc"),
        ];
        let graph = build_graph(&units, &scanner());
        assert_eq!(graph.edge_list(), vec![("calc.sps", "main.sps")]);
    }

    #[test]
    fn units_differing_only_in_case_keep_the_first() {
        let units = vec![
            SourceUnit::new("Calc.sps", "syntax/Calc.sps", "INSERT FILE='a.sps'."),
            SourceUnit::new("calc.SPS", "syntax/calc.SPS", "INSERT FILE='ghost.sps'."),
            unit("a.sps", ""),
        ];
        let graph = build_graph(&units, &scanner());

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_list(), vec![("a.sps", "calc.sps")]);
        assert_eq!(
            graph.warnings(),
            &[GraphWarning::DuplicateUnit {
                kept: "Calc.sps".to_string(),
                dropped: "calc.SPS".to_string(),
            }]
        );
        assert!(graph.warnings()[0].to_string().contains("calc.SPS"));
    }
}
