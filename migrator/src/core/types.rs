//! Shared deterministic types for migrator core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a task plays in the migrated pipeline.
///
/// Controllers only orchestrate other units and never touch Working State.
/// Logic tasks consume the Working State and may replace it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Controller,
    Logic,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Logic => "logic",
        }
    }
}

/// Lifecycle status of a manifest task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Specified,
    Drafted,
    Validated,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Specified => "specified",
            TaskStatus::Drafted => "drafted",
            TaskStatus::Validated => "validated",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one validation call.
///
/// The fatal arm (toolchain cannot run at all) is not a verdict: it is the `Err`
/// side of the `Result` returned by validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Pass { message: String },
    Fail { diagnostic: String },
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Verdict::Pass {
            message: message.into(),
        }
    }

    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Verdict::Fail {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Verdict::Pass { message } => message,
            Verdict::Fail { diagnostic } => diagnostic,
        }
    }
}

/// One recorded attempt of a refinement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Attempt number; `0` is the initial draft.
    pub attempt: u32,
    /// Candidate artifact that was validated (empty when the oracle produced nothing).
    pub candidate: String,
    /// Diagnostic reported for the candidate.
    pub diagnostic: String,
}

/// Ordered, append-only log of attempts for one task's refinement run.
///
/// Appending consumes the history and returns the extended one, so every loop
/// iteration threads the log explicitly instead of mutating shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureHistory {
    records: Vec<FailureRecord>,
}

impl FailureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, record: FailureRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&FailureRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_history_appends_in_order() {
        let history = FailureHistory::new()
            .with(FailureRecord {
                attempt: 0,
                candidate: "a".to_string(),
                diagnostic: "first".to_string(),
            })
            .with(FailureRecord {
                attempt: 1,
                candidate: "b".to_string(),
                diagnostic: "second".to_string(),
            });

        let attempts: Vec<u32> = history.records().iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![0, 1]);
        assert_eq!(history.last().map(|r| r.diagnostic.as_str()), Some("second"));
    }

    #[test]
    fn verdict_serializes_with_tag() {
        let json = serde_json::to_string(&Verdict::fail("boom")).expect("serialize");
        assert_eq!(json, r#"{"verdict":"fail","diagnostic":"boom"}"#);
    }
}
