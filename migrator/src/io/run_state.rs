//! Run state storage for pipeline bookkeeping.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::fsutil::{to_json_pretty, write_atomic};

/// How the last pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Complete,
    Partial,
    Halted,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Complete => "complete",
            RunOutcome::Partial => "partial",
            RunOutcome::Halted => "halted",
        }
    }
}

/// Persisted bookkeeping (`.migrator/state/run_state.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    /// Identifier of the run in progress, if any.
    pub run_id: Option<String>,
    /// Number of runs ever started in this project.
    pub runs_started: u32,
    /// Identifier of the most recently finished run.
    pub last_run_id: Option<String>,
    /// Outcome of the most recently finished run.
    pub last_outcome: Option<RunOutcome>,
}

impl RunState {
    /// Begin a new run and return its id.
    pub fn begin(&mut self, now: DateTime<Utc>) -> String {
        let run_id = format!("run-{}", now.format("%Y%m%dT%H%M%S%.3fZ"));
        self.run_id = Some(run_id.clone());
        self.runs_started += 1;
        run_id
    }

    /// Close the run in progress.
    pub fn finish(&mut self, outcome: RunOutcome) {
        self.last_run_id = self.run_id.take();
        self.last_outcome = Some(outcome);
    }
}

/// Load run state from disk, defaulting when the file is missing.
pub fn load_run_state(path: &Path) -> Result<RunState> {
    if !path.exists() {
        return Ok(RunState::default());
    }
    debug!(path = %path.display(), "loading run state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run state {}", path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;
    debug!(run_id = ?state.run_id, runs_started = state.runs_started, "run state loaded");
    Ok(state)
}

/// Atomically write run state to disk (temp file + rename).
pub fn write_run_state(path: &Path, state: &RunState) -> Result<()> {
    debug!(path = %path.display(), run_id = ?state.run_id, "writing run state");
    write_atomic(path, &to_json_pretty(state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Verifies write → read preserves all fields.
    #[test]
    fn run_state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");

        let state = RunState {
            run_id: None,
            runs_started: 5,
            last_run_id: Some("run-123".to_string()),
            last_outcome: Some(RunOutcome::Partial),
        };

        write_run_state(&path, &state).expect("write");
        let loaded = load_run_state(&path).expect("load");
        assert_eq!(loaded, state);
    }

    /// Ensures default RunState serializes to a known, stable JSON format.
    #[test]
    fn run_state_defaults_are_deterministic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");

        write_run_state(&path, &RunState::default()).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        let expected = "{\n  \"run_id\": null,\n  \"runs_started\": 0,\n  \"last_run_id\": null,\n  \"last_outcome\": null\n}\n";
        assert_eq!(contents, expected);
    }

    #[test]
    fn begin_and_finish_track_run_ids() {
        let mut state = RunState::default();
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 30, 5)
            .single()
            .expect("timestamp");
        let run_id = state.begin(now);
        assert_eq!(run_id, "run-20260301T123005.000Z");
        assert_eq!(state.runs_started, 1);

        state.finish(RunOutcome::Complete);
        assert_eq!(state.run_id, None);
        assert_eq!(state.last_run_id.as_deref(), Some("run-20260301T123005.000Z"));
        assert_eq!(state.last_outcome, Some(RunOutcome::Complete));
    }

    #[test]
    fn missing_file_loads_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = load_run_state(&temp.path().join("missing.json")).expect("load");
        assert_eq!(state, RunState::default());
    }
}
