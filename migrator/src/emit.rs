//! Emit stage: the entry-point script chaining every committed logic task.

use std::path::PathBuf;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::info;

use crate::core::manifest::Manifest;
use crate::core::types::{Role, TaskStatus};
use crate::io::config::MigratorConfig;
use crate::io::fsutil::write_atomic;
use crate::io::init::MigratorPaths;

const ENTRY_TEMPLATE: &str = include_str!("io/templates/entry.R");

#[derive(Debug, Serialize)]
struct EntryStep<'a> {
    id: &'a str,
    path: &'a str,
    status: TaskStatus,
    included: bool,
}

/// What the emitted script contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReport {
    pub path: PathBuf,
    /// Logic tasks whose committed artifact is sourced and called.
    pub included: Vec<String>,
    /// Logic tasks left out because they are not validated.
    pub skipped: Vec<String>,
}

/// Render the entry script for `manifest`. Controllers are never called.
pub fn render_entry_script(manifest: &Manifest, cfg: &MigratorConfig) -> Result<String> {
    let steps: Vec<EntryStep<'_>> = manifest
        .tasks
        .iter()
        .filter(|task| task.role == Role::Logic)
        .map(|task| EntryStep {
            id: &task.id,
            path: &task.artifacts.final_,
            status: task.status,
            included: task.status == TaskStatus::Validated,
        })
        .collect();
    let included: Vec<&EntryStep<'_>> = steps.iter().filter(|step| step.included).collect();

    let mut env = Environment::new();
    env.add_template("entry", ENTRY_TEMPLATE)
        .context("load entry script template")?;
    let rendered = env.get_template("entry")?.render(context! {
        included => included,
        steps => &steps,
        baseline => &cfg.state.baseline,
        key_field => &cfg.state.key_field,
    })?;
    Ok(rendered)
}

/// Write the entry script to `cfg.entry_script`.
pub fn emit_entry_script(
    paths: &MigratorPaths,
    cfg: &MigratorConfig,
    manifest: &Manifest,
) -> Result<EmitReport> {
    let path = paths.resolve(&cfg.entry_script);
    write_atomic(&path, &render_entry_script(manifest, cfg)?)?;

    let (included, skipped): (Vec<_>, Vec<_>) = manifest
        .tasks
        .iter()
        .filter(|task| task.role == Role::Logic)
        .partition(|task| task.status == TaskStatus::Validated);
    let report = EmitReport {
        path,
        included: included.into_iter().map(|task| task.id.clone()).collect(),
        skipped: skipped.into_iter().map(|task| task.id.clone()).collect(),
    };
    info!(
        path = %report.path.display(),
        included = report.included.len(),
        skipped = report.skipped.len(),
        "entry script written"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{ArtifactLayout, MANIFEST_VERSION, Task};

    fn task(id: &str, role: Role, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            source: format!("syntax/{id}.sps"),
            role,
            status,
            artifacts: ArtifactLayout::default().paths_for(id),
            attempts: 0,
            note: None,
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            version: MANIFEST_VERSION,
            complete: true,
            warnings: Vec::new(),
            tasks: vec![
                task("load", Role::Logic, TaskStatus::Validated),
                task("clean", Role::Logic, TaskStatus::Failed),
                task("report", Role::Logic, TaskStatus::Validated),
                task("main", Role::Controller, TaskStatus::Specified),
            ],
        }
    }

    #[test]
    fn only_validated_logic_tasks_are_sourced_in_order() {
        let script = render_entry_script(&manifest(), &MigratorConfig::default()).expect("render");

        let load = script.find("source(\"out/load.R\")").expect("load sourced");
        let report = script.find("source(\"out/report.R\")").expect("report sourced");
        assert!(load < report);
        assert!(!script.contains("source(\"out/clean.R\")"));
        assert!(!script.contains("main("));
        assert!(script.contains("# clean: skipped (failed)"));
        assert!(script.contains("df <- jsonlite::fromJSON(\"input_data.json\")"));
        assert!(script.contains("result <- load(df)\nif (is.data.frame(result) && \"id\" %in% names(result)) df <- result\n"));
    }

    #[test]
    fn emit_writes_configured_entry_script() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = MigratorPaths::new(temp.path());
        let report =
            emit_entry_script(&paths, &MigratorConfig::default(), &manifest()).expect("emit");

        assert_eq!(report.path, temp.path().join("main.R"));
        assert_eq!(report.included, vec!["load", "report"]);
        assert_eq!(report.skipped, vec!["clean"]);
        assert!(report.path.is_file());
    }
}
