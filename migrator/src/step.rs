//! Refinement of a single logic task.
//!
//! One step arms the safety latch, runs the refinement loop against the
//! current Working State, then either commits the accepted artifact and offers
//! its output to the propagator, or reverts to the pre-run snapshot.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::dataset::{Dataset, StatePredicate};
use crate::core::gate::{GatePolicy, judge};
use crate::core::manifest::Task;
use crate::core::refine::{Oracle, RefineOutcome, RefinementLoop, TaskContext, Validator};
use crate::core::types::{Role, TaskStatus, Verdict};
use crate::errors::{CriticalStructuralFailure, RefinementExhausted};
use crate::io::fsutil::read_optional;
use crate::io::harness::{ExecuteRequest, Harness};
use crate::io::init::MigratorPaths;
use crate::io::prompt::PromptEngine;
use crate::io::snapshot::SnapshotStore;
use crate::io::trace::{write_attempt, write_failure_trace};
use crate::io::working_state::{Propagation, Propagator};
use crate::latch::SafetyLatch;
use crate::stages::{mark_failed, set_status};

/// Validation gate bound to one task and one input dataset.
pub struct HarnessValidator<'a, H> {
    pub harness: &'a H,
    pub task_id: &'a str,
    pub input: &'a Dataset,
    pub policy: &'a GatePolicy,
}

impl<H: Harness> Validator for HarnessValidator<'_, H> {
    fn validate(&self, artifact: &str) -> Result<Verdict> {
        let execution = self.harness.execute(&ExecuteRequest {
            task_id: self.task_id,
            artifact,
            input: self.input,
        })?;
        let lint = if execution.success {
            self.harness.lint(self.task_id, artifact)?
        } else {
            Vec::new()
        };
        Ok(judge(&execution, &lint, self.policy))
    }
}

/// Collaborators shared by every step of a run.
pub struct StepEnv<'a, O, H> {
    pub paths: &'a MigratorPaths,
    pub run_id: &'a str,
    pub oracle: &'a O,
    pub harness: &'a H,
    pub prompts: &'a PromptEngine,
    pub policy: &'a GatePolicy,
    pub refinement: RefinementLoop,
    pub snapshots: &'a SnapshotStore,
}

/// How one task's step ended. Fatal errors are returned as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Candidate accepted at `attempt` and committed.
    Validated {
        attempt: u32,
        propagation: Propagation,
    },
    /// Every attempt failed; the committed artifact was reverted.
    Exhausted {
        exhausted: RefinementExhausted,
        trace_path: PathBuf,
    },
}

/// Refine one logic task in place.
///
/// A fatal harness error reverts the latch and is returned as a
/// [`CriticalStructuralFailure`].
#[instrument(skip_all, fields(task = %task.id))]
pub fn refine_task<O, H, P>(
    env: &StepEnv<'_, O, H>,
    task: &mut Task,
    propagator: &mut Propagator<P>,
) -> Result<StepOutcome>
where
    O: Oracle,
    H: Harness,
    P: StatePredicate,
{
    if task.role != Role::Logic {
        return Err(anyhow!("{}: controllers are never refined", task.id));
    }
    let paths = env.paths;
    let spec = read_optional(&paths.resolve(&task.artifacts.spec))?.unwrap_or_else(|| {
        warn!(task = %task.id, "specification missing; refining without it");
        String::new()
    });
    let draft = read_optional(&paths.resolve(&task.artifacts.draft))?.unwrap_or_default();
    let committed_path = paths.resolve(&task.artifacts.final_);

    let latch = SafetyLatch::arm(env.snapshots, &task.id, &committed_path, &draft)?;
    let initial = latch.known_good().to_string();
    let context = TaskContext {
        id: task.id.clone(),
        role: task.role,
        spec,
    };
    let validator = HarnessValidator {
        harness: env.harness,
        task_id: &task.id,
        input: propagator.current(),
        policy: env.policy,
    };

    let result = env.refinement.run(
        &context,
        initial,
        env.oracle,
        &validator,
        env.prompts,
        |attempt| {
            if let Err(err) = write_attempt(&paths.traces_dir, env.run_id, &context.id, attempt) {
                warn!(err = %format!("{err:#}"), "failed to write attempt trace");
            }
        },
    );

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            latch.revert()?;
            return Err(anyhow::Error::new(CriticalStructuralFailure::new(
                "refine",
                format!("{}: {err:#}", task.id),
            )));
        }
    };

    match outcome {
        RefineOutcome::Accepted {
            artifact, attempt, ..
        } => {
            latch.commit(&artifact)?;
            task.attempts = attempt;
            set_status(task, TaskStatus::Validated)?;
            let propagation = propagate(env, &task.id, &artifact, propagator)?;
            info!(attempt, ?propagation, "task validated");
            Ok(StepOutcome::Validated {
                attempt,
                propagation,
            })
        }
        RefineOutcome::Exhausted { history } => {
            latch.revert()?;
            let final_verdict = history.last().map(|record| Verdict::fail(&record.diagnostic));
            let trace_path = write_failure_trace(
                &paths.traces_dir,
                env.run_id,
                &task.id,
                &history,
                final_verdict.as_ref(),
            )?;
            task.attempts = history.last().map_or(0, |record| record.attempt);
            let exhausted = RefinementExhausted {
                task_id: task.id.clone(),
                attempts: task.attempts,
            };
            let last = history
                .last()
                .and_then(|record| record.diagnostic.lines().next())
                .unwrap_or_default();
            mark_failed(task, format!("{exhausted}; last diagnostic: {last}"));
            Ok(StepOutcome::Exhausted {
                exhausted,
                trace_path,
            })
        }
    }
}

/// Re-execute the committed artifact on the current Working State and offer
/// the result to the propagator.
fn propagate<O, H, P>(
    env: &StepEnv<'_, O, H>,
    task_id: &str,
    artifact: &str,
    propagator: &mut Propagator<P>,
) -> Result<Propagation>
where
    H: Harness,
    P: StatePredicate,
{
    let execution = env.harness.execute(&ExecuteRequest {
        task_id,
        artifact,
        input: propagator.current(),
    })?;
    match execution.output {
        Some(output) if execution.success => propagator.propagate(task_id, output),
        _ => {
            warn!(task = task_id, "re-execution produced no dataset; working state untouched");
            Ok(Propagation::Untouched)
        }
    }
}
