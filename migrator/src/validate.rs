//! Validation helpers for the `.migrator/` layout, config and manifest.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::invariants::order_violations;
use crate::io::config::load_config;
use crate::io::init::{GITIGNORE_ENTRIES, MigratorPaths};
use crate::io::manifest_store::load_manifest;
use crate::io::run_state::load_run_state;
use crate::io::sources::discover_units;
use crate::plan::plan_manifest;

/// Manifest validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidation {
    /// No manifest yet; run `migrator plan`.
    Missing,
    /// Manifest is valid. `stale` is true if replanning the current source
    /// units would produce a different task list.
    Ok { tasks: usize, stale: bool },
}

/// High-level validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub manifest: ManifestValidation,
    /// Run in progress according to `run_state.json` (left by an aborted run).
    pub interrupted_run: Option<String>,
}

/// Validate `.migrator/` layout, config, manifest and run state.
pub fn validate_project(root: &Path) -> Result<ValidateOutcome> {
    let paths = MigratorPaths::new(root);

    ensure_dir(&paths.migrator_dir)?;
    ensure_dir(&paths.state_dir)?;
    ensure_file(&paths.gitignore_path)?;
    ensure_file(&paths.config_path)?;
    ensure_gitignore(&paths.gitignore_path)?;

    let cfg = load_config(&paths.config_path).with_context(|| "load config.toml")?;
    ensure_dir(&paths.resolve(&cfg.source_dir))?;

    let run_state = load_run_state(&paths.run_state_path).with_context(|| "load run_state.json")?;

    if !paths.manifest_path.exists() {
        return Ok(ValidateOutcome {
            manifest: ManifestValidation::Missing,
            interrupted_run: run_state.run_id,
        });
    }
    let manifest = load_manifest(&paths.manifest_path).with_context(|| "load manifest.json")?;

    let units = discover_units(&paths, &cfg)?;
    let (fresh, graph) = plan_manifest(&units, &cfg)?;
    let stale = fresh.identity() != manifest.identity()
        || fresh
            .tasks
            .iter()
            .zip(&manifest.tasks)
            .any(|(a, b)| a.source != b.source);

    if manifest.complete {
        let key_by_source: BTreeMap<&str, &str> = units
            .iter()
            .map(|unit| (unit.path.as_str(), unit.key.as_str()))
            .collect();
        let order: Vec<&str> = manifest
            .tasks
            .iter()
            .filter_map(|task| key_by_source.get(task.source.as_str()).copied())
            .collect();
        let violations = order_violations(&order, &graph);
        if !violations.is_empty() {
            let edges: Vec<String> = violations
                .iter()
                .map(|(from, to)| format!("{from} -> {to}"))
                .collect();
            return Err(anyhow!(
                "manifest order violates dependencies: {}",
                edges.join(", ")
            ));
        }
    }

    Ok(ValidateOutcome {
        manifest: ManifestValidation::Ok {
            tasks: manifest.tasks.len(),
            stale,
        },
        interrupted_run: run_state.run_id,
    })
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("missing directory {}", path.display()));
    }
    if !path.is_dir() {
        return Err(anyhow!("expected directory {}", path.display()));
    }
    Ok(())
}

fn ensure_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("missing file {}", path.display()));
    }
    if !path.is_file() {
        return Err(anyhow!("expected file {}", path.display()));
    }
    Ok(())
}

fn ensure_gitignore(path: &Path) -> Result<()> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    for required in GITIGNORE_ENTRIES {
        if !contents.lines().any(|line| line.trim() == required) {
            return Err(anyhow!("missing '{}' in {}", required, path.display()));
        }
    }
    Ok(())
}
