//! Specify and draft stages: oracle calls that produce the per-task artifacts
//! the refinement step starts from.

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::core::extract::extract_code;
use crate::core::lifecycle::{resume_status, transition};
use crate::core::manifest::{Manifest, Task};
use crate::core::refine::{Oracle, TaskContext};
use crate::core::types::{Role, TaskStatus};
use crate::io::fsutil::{read_optional, write_file};
use crate::io::init::MigratorPaths;
use crate::io::manifest_store::write_manifest;
use crate::io::prompt::PromptEngine;

/// Tasks moved forward or failed by one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub advanced: Vec<String>,
    pub failed: Vec<String>,
}

/// Apply a lifecycle transition to `task`.
pub fn set_status(task: &mut Task, to: TaskStatus) -> Result<()> {
    task.status = transition(task.role, task.status, to).map_err(|err| anyhow!("{}: {err}", task.id))?;
    if to != TaskStatus::Failed {
        task.note = None;
    }
    Ok(())
}

/// Mark `task` failed with a note. Always legal.
pub fn mark_failed(task: &mut Task, note: impl Into<String>) {
    let note = note.into();
    warn!(task = %task.id, %note, "task failed");
    task.status = TaskStatus::Failed;
    task.note = Some(note);
}

/// Reopen failed tasks at the stage that failed, based on which artifacts exist.
pub fn reopen_failed(paths: &MigratorPaths, manifest: &mut Manifest) -> Result<usize> {
    let mut reopened = 0;
    for task in &mut manifest.tasks {
        if task.status != TaskStatus::Failed {
            continue;
        }
        let has_spec = paths.resolve(&task.artifacts.spec).is_file();
        let has_draft = paths.resolve(&task.artifacts.draft).is_file();
        let status = resume_status(task.role, task.status, has_spec, has_draft);
        if status != task.status {
            set_status(task, status)?;
            reopened += 1;
        }
    }
    if reopened > 0 {
        info!(reopened, "failed tasks reopened");
        write_manifest(&paths.manifest_path, manifest)?;
    }
    Ok(reopened)
}

/// Turn every `pending` task's source unit into a Markdown specification.
pub fn specify_pending<O: Oracle>(
    paths: &MigratorPaths,
    manifest: &mut Manifest,
    prompts: &PromptEngine,
    oracle: &O,
) -> Result<StageReport> {
    let mut report = StageReport::default();
    for index in 0..manifest.tasks.len() {
        let task = &mut manifest.tasks[index];
        if task.status != TaskStatus::Pending {
            continue;
        }
        let Some(source) = read_optional(&paths.resolve(&task.source))? else {
            mark_failed(task, format!("source unit {} is missing", task.source));
            report.failed.push(task.id.clone());
            write_manifest(&paths.manifest_path, manifest)?;
            continue;
        };
        let prompt = prompts.render_specify(task, &source)?;
        match oracle.generate(&prompt).filter(|text| !text.trim().is_empty()) {
            Some(spec) => {
                write_file(&paths.resolve(&task.artifacts.spec), &format!("{}\n", spec.trim()))?;
                set_status(task, TaskStatus::Specified)?;
                info!(task = %task.id, "specified");
                report.advanced.push(task.id.clone());
            }
            None => {
                mark_failed(task, "generation failure: no specification returned");
                report.failed.push(task.id.clone());
            }
        }
        write_manifest(&paths.manifest_path, manifest)?;
    }
    Ok(report)
}

/// Turn every `specified` logic task's specification into its first candidate.
///
/// Controllers stay `specified`; they are never drafted.
pub fn draft_specified<O: Oracle>(
    paths: &MigratorPaths,
    manifest: &mut Manifest,
    prompts: &PromptEngine,
    oracle: &O,
) -> Result<StageReport> {
    let mut report = StageReport::default();
    for index in 0..manifest.tasks.len() {
        let task = &mut manifest.tasks[index];
        if task.status != TaskStatus::Specified || task.role != Role::Logic {
            continue;
        }
        let Some(spec) = read_optional(&paths.resolve(&task.artifacts.spec))? else {
            mark_failed(task, format!("specification {} is missing", task.artifacts.spec));
            report.failed.push(task.id.clone());
            write_manifest(&paths.manifest_path, manifest)?;
            continue;
        };
        let context = TaskContext {
            id: task.id.clone(),
            role: task.role,
            spec,
        };
        let prompt = prompts.render_draft(&context)?;
        let draft = oracle
            .generate(&prompt)
            .map(|response| extract_code(&response))
            .filter(|code| !code.is_empty());
        match draft {
            Some(code) => {
                write_file(&paths.resolve(&task.artifacts.draft), &format!("{code}\n"))?;
                set_status(task, TaskStatus::Drafted)?;
                info!(task = %task.id, "drafted");
                report.advanced.push(task.id.clone());
            }
            None => {
                mark_failed(task, "generation failure: no draft returned");
                report.failed.push(task.id.clone());
            }
        }
        write_manifest(&paths.manifest_path, manifest)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::MigratorConfig;
    use crate::plan::{PlanOptions, plan_project};
    use crate::test_support::{ScriptedOracle, TestProject};
    use std::fs;

    fn planned() -> (TestProject, Manifest, PromptEngine) {
        let project = TestProject::new().expect("project");
        project
            .add_source("01_calc.sps", "COMPUTE delay_days = end - start.\n")
            .expect("source");
        project
            .add_source("00_main.sps", "INSERT FILE='01_calc.sps'.\n")
            .expect("source");
        let cfg = MigratorConfig::default();
        let manifest = plan_project(project.paths(), &cfg, PlanOptions::default())
            .expect("plan")
            .manifest;
        let prompts = PromptEngine::new(cfg.prompt_settings()).expect("prompts");
        (project, manifest, prompts)
    }

    #[test]
    fn specify_then_draft_advances_logic_and_parks_controllers() {
        let (project, mut manifest, prompts) = planned();
        let paths = project.paths();
        let oracle = ScriptedOracle::new(vec![
            Some("Computes delays.".to_string()),
            Some("Entry point.".to_string()),
            Some("```r\ncalc <- function(df) df\n```".to_string()),
        ]);

        let specified = specify_pending(paths, &mut manifest, &prompts, &oracle).expect("specify");
        assert_eq!(specified.advanced, vec!["calc", "main"]);
        let drafted = draft_specified(paths, &mut manifest, &prompts, &oracle).expect("draft");
        assert_eq!(drafted.advanced, vec!["calc"]);
        oracle.assert_drained();

        assert_eq!(manifest.task("calc").expect("calc").status, TaskStatus::Drafted);
        assert_eq!(manifest.task("main").expect("main").status, TaskStatus::Specified);
        assert_eq!(
            fs::read_to_string(paths.resolve("drafts/calc.R")).expect("draft"),
            "calc <- function(df) df\n"
        );
        assert!(oracle.prompts()[0].contains("COMPUTE delay_days"));
        assert!(oracle.prompts()[2].contains("Computes delays."));
    }

    #[test]
    fn generation_failure_marks_task_failed_and_reopens_later() {
        let (project, mut manifest, prompts) = planned();
        let paths = project.paths();
        let oracle = ScriptedOracle::new(vec![None, Some("Entry point.".to_string())]);

        let report = specify_pending(paths, &mut manifest, &prompts, &oracle).expect("specify");
        assert_eq!(report.failed, vec!["calc"]);
        let calc = manifest.task("calc").expect("calc");
        assert_eq!(calc.status, TaskStatus::Failed);
        assert!(calc.note.as_deref().is_some_and(|n| n.contains("generation failure")));

        assert_eq!(reopen_failed(paths, &mut manifest).expect("reopen"), 1);
        let calc = manifest.task("calc").expect("calc");
        assert_eq!(calc.status, TaskStatus::Pending);
        assert_eq!(calc.note, None);
    }
}
