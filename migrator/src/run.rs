//! Full pipeline run: plan, specify, draft, preflight, refine, emit, report.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::core::dataset::StableKey;
use crate::core::lifecycle::is_refinable;
use crate::core::manifest::Manifest;
use crate::core::refine::{Oracle, RefinementLoop};
use crate::core::types::{Role, TaskStatus};
use crate::emit::{EmitReport, emit_entry_script};
use crate::errors::CriticalStructuralFailure;
use crate::io::config::load_config;
use crate::io::harness::Harness;
use crate::io::init::MigratorPaths;
use crate::io::manifest_store::write_manifest;
use crate::io::prompt::PromptEngine;
use crate::io::run_state::{RunOutcome, load_run_state, write_run_state};
use crate::io::snapshot::SnapshotStore;
use crate::io::working_state::Propagator;
use crate::plan::load_or_plan;
use crate::preflight::preflight;
use crate::report::{TaskRow, task_rows};
use crate::stages::{draft_specified, reopen_failed, specify_pending};
use crate::step::{StepEnv, StepOutcome, refine_task};

/// Options for `migrator run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Rebuild the manifest from the source units and reset all progress.
    pub force: bool,
    /// Override `max_retries` from the config.
    pub max_retries: Option<u32>,
}

/// Reason why `run_pipeline` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Every task reached its final status.
    Complete,
    /// The run finished but some tasks failed or were not refined.
    Partial,
    /// A critical structural failure stopped the run.
    Halted { stage: String, reason: String },
}

impl RunStop {
    pub fn outcome(&self) -> RunOutcome {
        match self {
            RunStop::Complete => RunOutcome::Complete,
            RunStop::Partial => RunOutcome::Partial,
            RunStop::Halted { .. } => RunOutcome::Halted,
        }
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: String,
    pub stop: RunStop,
    pub rows: Vec<TaskRow>,
    /// Graph warnings recorded in the manifest.
    pub warnings: Vec<String>,
    /// `None` when the run halted before the emit stage.
    pub emitted: Option<EmitReport>,
}

/// Run every stage over the project at `root`.
///
/// Task-level failures are recorded in the manifest and the run continues. A
/// [`CriticalStructuralFailure`] stops the run and is reported as
/// [`RunStop::Halted`]. Any other error is returned.
pub fn run_pipeline<O: Oracle, H: Harness>(
    root: &Path,
    oracle: &O,
    harness: &H,
    options: &RunOptions,
) -> Result<RunReport> {
    let paths = MigratorPaths::new(root);
    let mut cfg = load_config(&paths.config_path)
        .with_context(|| format!("load {}", paths.config_path.display()))?;
    if let Some(max_retries) = options.max_retries {
        cfg.max_retries = max_retries;
    }

    let mut run_state = load_run_state(&paths.run_state_path)?;
    let run_id = run_state.begin(Utc::now());
    write_run_state(&paths.run_state_path, &run_state)?;
    info!(%run_id, "run started");

    let mut manifest = load_or_plan(&paths, &cfg, options.force)?.manifest;
    let prompts = PromptEngine::new(cfg.prompt_settings())?;

    reopen_failed(&paths, &mut manifest)?;
    let specified = specify_pending(&paths, &mut manifest, &prompts, oracle)?;
    info!(
        advanced = specified.advanced.len(),
        failed = specified.failed.len(),
        "specify stage done"
    );
    let drafted = draft_specified(&paths, &mut manifest, &prompts, oracle)?;
    info!(
        advanced = drafted.advanced.len(),
        failed = drafted.failed.len(),
        "draft stage done"
    );

    let mut halted: Option<CriticalStructuralFailure> = None;
    let mut refined = false;
    match preflight(&paths, &cfg, harness) {
        Ok(baseline) => {
            let mut propagator = Propagator::reset(
                &paths.working_state_path,
                baseline,
                StableKey::new(&cfg.state.key_field),
            )?;
            let snapshots = SnapshotStore::new(&paths.snapshots_dir);
            let policy = cfg.gate_policy();
            let env = StepEnv {
                paths: &paths,
                run_id: &run_id,
                oracle,
                harness,
                prompts: &prompts,
                policy: &policy,
                refinement: RefinementLoop::new(cfg.max_retries),
                snapshots: &snapshots,
            };
            halted = refine_all(&env, &mut manifest, &mut propagator, cfg.stop_on_failure)?;
            propagator.clear()?;
            refined = true;
        }
        Err(err) => {
            let critical = err.downcast::<CriticalStructuralFailure>()?;
            if cfg.halt_on_critical {
                halted = Some(critical);
            } else {
                warn!(%critical, "halt_on_critical is off; skipping refinement");
            }
        }
    }

    let emitted = match halted {
        Some(_) => None,
        None => Some(emit_entry_script(&paths, &cfg, &manifest)?),
    };

    let stop = match halted {
        Some(critical) => RunStop::Halted {
            stage: critical.stage,
            reason: critical.reason,
        },
        None if refined && is_complete(&manifest) => RunStop::Complete,
        None => RunStop::Partial,
    };
    run_state.finish(stop.outcome());
    write_run_state(&paths.run_state_path, &run_state)?;
    info!(%run_id, outcome = stop.outcome().as_str(), "run finished");

    Ok(RunReport {
        run_id,
        stop,
        rows: task_rows(&manifest),
        warnings: manifest.warnings.clone(),
        emitted,
    })
}

/// Refine every refinable task in manifest order, persisting after each one.
///
/// Returns the critical failure that stopped the stage, if any.
fn refine_all<O: Oracle, H: Harness>(
    env: &StepEnv<'_, O, H>,
    manifest: &mut Manifest,
    propagator: &mut Propagator<StableKey>,
    stop_on_failure: bool,
) -> Result<Option<CriticalStructuralFailure>> {
    for index in 0..manifest.tasks.len() {
        let task = &mut manifest.tasks[index];
        if !is_refinable(task.role, task.status) {
            continue;
        }
        let result = refine_task(env, task, propagator);
        write_manifest(&env.paths.manifest_path, manifest)?;
        match result {
            Ok(StepOutcome::Validated { .. }) => {}
            Ok(StepOutcome::Exhausted { exhausted, .. }) => {
                if stop_on_failure {
                    info!(%exhausted, "stop_on_failure is set; ending refinement");
                    break;
                }
            }
            Err(err) => {
                return match err.downcast::<CriticalStructuralFailure>() {
                    Ok(critical) => Ok(Some(critical)),
                    Err(err) => Err(err),
                };
            }
        }
    }
    Ok(None)
}

/// Logic tasks validated and controllers specified.
fn is_complete(manifest: &Manifest) -> bool {
    manifest.tasks.iter().all(|task| match task.role {
        Role::Logic => task.status == TaskStatus::Validated,
        Role::Controller => task.status == TaskStatus::Specified,
    })
}
