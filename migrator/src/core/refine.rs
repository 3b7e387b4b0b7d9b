//! Bounded, history-aware refinement loop.
//!
//! The loop validates the initial draft as attempt 0 and, while it fails,
//! asks the oracle for a new candidate up to `max_retries` times. Every
//! refinement request carries the complete failure history so far.

use anyhow::Result;
use tracing::debug;

use super::extract::extract_code;
use super::types::{FailureHistory, FailureRecord, Role, Verdict};

/// Opaque text-to-text generation service.
///
/// `None` (or an empty string) is a generation failure.
pub trait Oracle {
    fn generate(&self, prompt: &str) -> Option<String>;
}

/// Validation gate contract.
///
/// `Ok(Verdict)` is a retryable outcome; `Err` means the toolchain itself is
/// unusable and aborts the loop.
pub trait Validator {
    fn validate(&self, artifact: &str) -> Result<Verdict>;
}

/// Renders the oracle prompt for one refinement attempt.
pub trait RequestBuilder {
    fn build(&self, request: &RefineRequest<'_>) -> Result<String>;
}

/// Static context of the task being refined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub id: String,
    pub role: Role,
    /// Specification text the artifact must implement.
    pub spec: String,
}

/// Inputs of one refinement request.
#[derive(Debug, Clone, Copy)]
pub struct RefineRequest<'a> {
    pub task: &'a TaskContext,
    /// Attempt the request is for (1-based).
    pub attempt: u32,
    /// Most recent candidate that produced a diagnostic.
    pub candidate: &'a str,
    /// Every attempt made so far, oldest first.
    pub history: &'a FailureHistory,
}

/// One validated (or failed-to-generate) attempt, reported to the observer.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    pub attempt: u32,
    /// `None` for attempt 0.
    pub prompt: Option<&'a str>,
    pub candidate: &'a str,
    pub verdict: &'a Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    Accepted {
        artifact: String,
        attempt: u32,
        history: FailureHistory,
    },
    Exhausted {
        history: FailureHistory,
    },
}

impl RefineOutcome {
    pub fn history(&self) -> &FailureHistory {
        match self {
            RefineOutcome::Accepted { history, .. } | RefineOutcome::Exhausted { history } => {
                history
            }
        }
    }

    /// Highest attempt number reached.
    pub fn attempts(&self) -> u32 {
        match self {
            RefineOutcome::Accepted { attempt, .. } => *attempt,
            RefineOutcome::Exhausted { history } => history.last().map_or(0, |r| r.attempt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementLoop {
    pub max_retries: u32,
}

impl Default for RefinementLoop {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RefinementLoop {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Run the loop. Makes at most `max_retries + 1` validation calls.
    pub fn run<O, V, B, F>(
        &self,
        task: &TaskContext,
        initial: String,
        oracle: &O,
        validator: &V,
        builder: &B,
        mut on_attempt: F,
    ) -> Result<RefineOutcome>
    where
        O: Oracle,
        V: Validator,
        B: RequestBuilder,
        F: FnMut(&Attempt<'_>),
    {
        let verdict = validator.validate(&initial)?;
        on_attempt(&Attempt {
            attempt: 0,
            prompt: None,
            candidate: &initial,
            verdict: &verdict,
        });
        if verdict.passed() {
            debug!(task = %task.id, "initial draft accepted");
            return Ok(RefineOutcome::Accepted {
                artifact: initial,
                attempt: 0,
                history: FailureHistory::new(),
            });
        }

        let mut history = FailureHistory::new().with(FailureRecord {
            attempt: 0,
            candidate: initial.clone(),
            diagnostic: verdict.message().to_string(),
        });
        let mut current = initial;

        for attempt in 1..=self.max_retries {
            let prompt = builder.build(&RefineRequest {
                task,
                attempt,
                candidate: &current,
                history: &history,
            })?;
            let generated = oracle
                .generate(&prompt)
                .map(|response| extract_code(&response))
                .filter(|candidate| !candidate.is_empty());

            let Some(candidate) = generated else {
                let verdict = Verdict::fail("generation failure: the oracle returned no candidate");
                on_attempt(&Attempt {
                    attempt,
                    prompt: Some(&prompt),
                    candidate: "",
                    verdict: &verdict,
                });
                debug!(task = %task.id, attempt, "empty oracle response");
                history = history.with(FailureRecord {
                    attempt,
                    candidate: String::new(),
                    diagnostic: verdict.message().to_string(),
                });
                continue;
            };

            let verdict = validator.validate(&candidate)?;
            on_attempt(&Attempt {
                attempt,
                prompt: Some(&prompt),
                candidate: &candidate,
                verdict: &verdict,
            });
            history = history.with(FailureRecord {
                attempt,
                candidate: candidate.clone(),
                diagnostic: verdict.message().to_string(),
            });
            if verdict.passed() {
                debug!(task = %task.id, attempt, "candidate accepted");
                return Ok(RefineOutcome::Accepted {
                    artifact: candidate,
                    attempt,
                    history,
                });
            }
            debug!(task = %task.id, attempt, "candidate rejected");
            current = candidate;
        }

        Ok(RefineOutcome::Exhausted { history })
    }
}
