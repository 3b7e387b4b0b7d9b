//! Plan stage: source units -> dependency graph -> schedule -> manifest.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::graph::{DependencyGraph, SourceUnit, build_graph};
use crate::core::manifest::{Manifest, build_manifest, merge_progress};
use crate::core::schedule::schedule;
use crate::io::config::MigratorConfig;
use crate::io::fsutil::write_atomic;
use crate::io::init::MigratorPaths;
use crate::io::manifest_store::{load_manifest, write_manifest};
use crate::io::sources::discover_units;

/// Options for [`plan_project`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Discard progress recorded in an existing manifest.
    pub force: bool,
}

/// Result of the plan stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanReport {
    pub manifest: Manifest,
    /// True if the manifest was rebuilt from the source units (false: loaded).
    pub regenerated: bool,
}

impl PlanReport {
    pub fn warnings(&self) -> &[String] {
        &self.manifest.warnings
    }
}

/// Build a fresh manifest (every task `pending`) and the graph it came from.
pub fn plan_manifest(
    units: &[SourceUnit],
    cfg: &MigratorConfig,
) -> Result<(Manifest, DependencyGraph)> {
    let scanner = cfg.scanner()?;
    let entry_points = cfg.entry_points()?;
    let graph = build_graph(units, &scanner);
    let order = schedule(&graph);
    let manifest = build_manifest(units, &graph, &order, &entry_points, &cfg.layout());
    Ok((manifest, graph))
}

/// Rebuild the manifest from disk, keep progress unless forced, and persist it
/// together with `architecture.md`.
pub fn plan_project(
    paths: &MigratorPaths,
    cfg: &MigratorConfig,
    options: PlanOptions,
) -> Result<PlanReport> {
    let units = discover_units(paths, cfg)?;
    let (fresh, graph) = plan_manifest(&units, cfg)?;

    let manifest = if !options.force && paths.manifest_path.exists() {
        let previous = load_manifest(&paths.manifest_path)
            .with_context(|| "load previous manifest (use --force to rebuild)")?;
        merge_progress(fresh, &previous)
    } else {
        fresh
    };

    for warning in &manifest.warnings {
        warn!(%warning, "graph warning");
    }
    write_manifest(&paths.manifest_path, &manifest)?;
    write_atomic(
        &paths.architecture_path,
        &render_architecture(&manifest, &graph, &units),
    )?;
    info!(
        tasks = manifest.tasks.len(),
        complete = manifest.complete,
        warnings = manifest.warnings.len(),
        "manifest planned"
    );

    Ok(PlanReport {
        manifest,
        regenerated: true,
    })
}

/// Load the persisted manifest, planning it first when missing or forced.
pub fn load_or_plan(paths: &MigratorPaths, cfg: &MigratorConfig, force: bool) -> Result<PlanReport> {
    if !force && paths.manifest_path.exists() {
        let manifest = load_manifest(&paths.manifest_path)?;
        return Ok(PlanReport {
            manifest,
            regenerated: false,
        });
    }
    plan_project(paths, cfg, PlanOptions { force })
}

/// Audit document: execution chain plus the dependency graph as mermaid.
pub fn render_architecture(
    manifest: &Manifest,
    graph: &DependencyGraph,
    units: &[SourceUnit],
) -> String {
    let id_by_source: BTreeMap<&str, &str> = manifest
        .tasks
        .iter()
        .map(|task| (task.source.as_str(), task.id.as_str()))
        .collect();
    let id_by_key: BTreeMap<&str, &str> = units
        .iter()
        .filter_map(|unit| {
            id_by_source
                .get(unit.path.as_str())
                .map(|id| (unit.key.as_str(), *id))
        })
        .collect();

    let mut buf = String::from("# Architecture\n\n## Execution chain\n\n");
    for (index, task) in manifest.tasks.iter().enumerate() {
        buf.push_str(&format!(
            "{}. `{}` ({}) from `{}`\n",
            index + 1,
            task.id,
            task.role.as_str(),
            task.source
        ));
    }
    if !manifest.complete {
        buf.push_str("\nThe order is incomplete: the graph has a cycle.\n");
    }

    buf.push_str("\n## Dependency graph\n\n```mermaid\ngraph TD\n");
    for task in &manifest.tasks {
        buf.push_str(&format!("    {}[\"{}\"]\n", task.id, task.source));
    }
    for (from, to) in graph.edge_list() {
        if let (Some(from), Some(to)) = (id_by_key.get(from), id_by_key.get(to)) {
            buf.push_str(&format!("    {from} --> {to}\n"));
        }
    }
    buf.push_str("```\n");

    if !manifest.warnings.is_empty() {
        buf.push_str("\n## Warnings\n\n");
        for warning in &manifest.warnings {
            buf.push_str(&format!("- {warning}\n"));
        }
    }
    buf
}
