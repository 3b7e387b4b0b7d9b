//! Preflight gate run before refinement.
//!
//! Detects structural defects that would make every downstream step fail: an
//! unusable baseline dataset or a harness toolchain that cannot run at all.

use anyhow::Result;
use tracing::{debug, info};

use crate::core::dataset::Dataset;
use crate::errors::CriticalStructuralFailure;
use crate::io::config::MigratorConfig;
use crate::io::harness::{ExecuteRequest, Harness};
use crate::io::init::MigratorPaths;
use crate::io::working_state::load_baseline;

const PROBE_TASK: &str = "preflight";

/// Check the baseline and probe the harness.
///
/// Returns the baseline on success. A defect is returned as
/// `Err(CriticalStructuralFailure)` for callers to downcast.
pub fn preflight<H: Harness>(
    paths: &MigratorPaths,
    cfg: &MigratorConfig,
    harness: &H,
) -> Result<Dataset> {
    let baseline_path = paths.resolve(&cfg.state.baseline);
    let baseline = load_baseline(&baseline_path)
        .map_err(|err| critical(format!("baseline dataset unusable: {err:#}")))?;
    if baseline.is_empty() {
        return Err(critical(format!(
            "baseline dataset {} has no rows",
            cfg.state.baseline
        )));
    }
    let key = &cfg.state.key_field;
    if !baseline.every_row_has(key) {
        return Err(critical(format!(
            "baseline dataset {} has rows without key field '{key}'",
            cfg.state.baseline
        )));
    }

    let probe = harness.execute(&ExecuteRequest {
        task_id: PROBE_TASK,
        artifact: "",
        input: &baseline,
    });
    if let Err(err) = probe {
        return Err(critical(format!("validation harness cannot run: {err:#}")));
    }
    debug!("harness probe completed");

    info!(
        rows = baseline.row_count(),
        fields = baseline.fields().len(),
        "preflight passed"
    );
    Ok(baseline)
}

fn critical(reason: String) -> anyhow::Error {
    anyhow::Error::new(CriticalStructuralFailure::new(PROBE_TASK, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MiniHarness, TestProject};
    use serde_json::json;

    fn stage_of(err: &anyhow::Error) -> &str {
        &err.downcast_ref::<CriticalStructuralFailure>()
            .expect("critical failure")
            .stage
    }

    #[test]
    fn healthy_project_returns_baseline() {
        let project = TestProject::new().expect("project");
        project
            .write_baseline(json!([{"id": 1, "start": 3}]))
            .expect("baseline");

        let baseline = preflight(project.paths(), &MigratorConfig::default(), &MiniHarness::new())
            .expect("preflight");
        assert_eq!(baseline.row_count(), 1);
    }

    #[test]
    fn missing_key_field_is_critical() {
        let project = TestProject::new().expect("project");
        project
            .write_baseline(json!([{"id": 1}, {"start": 3}]))
            .expect("baseline");

        let err = preflight(project.paths(), &MigratorConfig::default(), &MiniHarness::new())
            .unwrap_err();
        assert_eq!(stage_of(&err), "preflight");
        assert!(err.to_string().contains("without key field 'id'"));
    }

    #[test]
    fn missing_or_empty_baseline_is_critical() {
        let project = TestProject::new().expect("project");
        let err = preflight(project.paths(), &MigratorConfig::default(), &MiniHarness::new())
            .unwrap_err();
        assert!(err.to_string().contains("baseline dataset unusable"));

        project.write_baseline(json!([])).expect("baseline");
        let err = preflight(project.paths(), &MigratorConfig::default(), &MiniHarness::new())
            .unwrap_err();
        assert!(err.to_string().contains("has no rows"));
    }

    #[test]
    fn broken_toolchain_is_critical() {
        let project = TestProject::new().expect("project");
        project
            .write_baseline(json!([{"id": 1}]))
            .expect("baseline");

        let err = preflight(
            project.paths(),
            &MigratorConfig::default(),
            &MiniHarness::broken(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("validation harness cannot run"));
    }
}
