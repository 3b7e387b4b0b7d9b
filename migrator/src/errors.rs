//! Typed errors that callers downcast from `anyhow::Error`.

use std::fmt;

/// A structural defect severe enough to halt the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalStructuralFailure {
    /// Stage that detected the defect (e.g. `preflight`, `refine`).
    pub stage: String,
    pub reason: String,
}

impl CriticalStructuralFailure {
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CriticalStructuralFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "critical structural failure in {}: {}",
            self.stage, self.reason
        )
    }
}

impl std::error::Error for CriticalStructuralFailure {}

/// A task used up its refinement attempts. Task-local; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementExhausted {
    pub task_id: String,
    /// Number of the last refinement attempt; attempt 0 is the initial draft.
    pub attempts: u32,
}

impl fmt::Display for RefinementExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {} exhausted refinement after {} attempt(s)",
            self.task_id, self.attempts
        )
    }
}

impl std::error::Error for RefinementExhausted {}
