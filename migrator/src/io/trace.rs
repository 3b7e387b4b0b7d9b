//! Audit traces under `.migrator/traces/<run>/`.
//!
//! Every refinement attempt gets its own directory with the prompt, the
//! candidate and the verdict. Tasks that exhaust their retries also get a
//! `<task>.json` dump of the full failure history.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::core::refine::Attempt;
use crate::core::types::{FailureHistory, Verdict};
use crate::io::fsutil::{to_json_pretty, write_file};

#[derive(Debug, Clone)]
pub struct AttemptPaths {
    pub dir: PathBuf,
    pub prompt_path: PathBuf,
    pub candidate_path: PathBuf,
    pub verdict_path: PathBuf,
}

impl AttemptPaths {
    pub fn new(traces_dir: &Path, run_id: &str, task_id: &str, attempt: u32) -> Self {
        let dir = traces_dir
            .join(run_id)
            .join(task_id)
            .join(attempt.to_string());
        Self {
            prompt_path: dir.join("prompt.md"),
            candidate_path: dir.join("candidate.txt"),
            verdict_path: dir.join("verdict.json"),
            dir,
        }
    }
}

pub fn failure_trace_path(traces_dir: &Path, run_id: &str, task_id: &str) -> PathBuf {
    traces_dir.join(run_id).join(format!("{task_id}.json"))
}

/// Write the logs of one attempt. The prompt is omitted for attempt 0.
pub fn write_attempt(
    traces_dir: &Path,
    run_id: &str,
    task_id: &str,
    attempt: &Attempt<'_>,
) -> Result<AttemptPaths> {
    let paths = AttemptPaths::new(traces_dir, run_id, task_id, attempt.attempt);
    if let Some(prompt) = attempt.prompt {
        write_file(&paths.prompt_path, prompt)?;
    }
    write_file(&paths.candidate_path, attempt.candidate)?;
    write_file(&paths.verdict_path, &to_json_pretty(attempt.verdict)?)?;
    Ok(paths)
}

#[derive(Debug, Serialize)]
struct FailureTrace<'a> {
    run_id: &'a str,
    task_id: &'a str,
    attempts: usize,
    final_verdict: Option<&'a Verdict>,
    history: &'a FailureHistory,
}

/// Dump the complete failure history of an exhausted task for human review.
pub fn write_failure_trace(
    traces_dir: &Path,
    run_id: &str,
    task_id: &str,
    history: &FailureHistory,
    final_verdict: Option<&Verdict>,
) -> Result<PathBuf> {
    let path = failure_trace_path(traces_dir, run_id, task_id);
    let trace = FailureTrace {
        run_id,
        task_id,
        attempts: history.len(),
        final_verdict,
        history,
    };
    write_file(&path, &to_json_pretty(&trace)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FailureRecord;
    use std::fs;

    #[test]
    fn attempt_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AttemptPaths::new(temp.path(), "run-1", "calc", 2);
        assert!(paths.dir.ends_with(Path::new("run-1/calc/2")));
        assert!(paths.prompt_path.ends_with("prompt.md"));
        assert!(paths.candidate_path.ends_with("candidate.txt"));
        assert!(paths.verdict_path.ends_with("verdict.json"));
    }

    #[test]
    fn initial_attempt_has_no_prompt_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let verdict = Verdict::fail("boom");
        let paths = write_attempt(
            temp.path(),
            "run-1",
            "calc",
            &Attempt {
                attempt: 0,
                prompt: None,
                candidate: "df",
                verdict: &verdict,
            },
        )
        .expect("write");
        assert!(!paths.prompt_path.exists());
        assert_eq!(fs::read_to_string(&paths.candidate_path).expect("read"), "df");
        assert!(
            fs::read_to_string(&paths.verdict_path)
                .expect("read")
                .contains("\"diagnostic\": \"boom\"")
        );
    }

    #[test]
    fn failure_trace_keeps_every_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let history = (0..4).fold(FailureHistory::new(), |h, attempt| {
            h.with(FailureRecord {
                attempt,
                candidate: format!("v{attempt}"),
                diagnostic: format!("error {attempt}"),
            })
        });
        let path = write_failure_trace(temp.path(), "run-1", "calc", &history, None)
            .expect("write");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(value["attempts"], 4);
        assert_eq!(value["history"][3]["diagnostic"], "error 3");
        assert_eq!(value["history"][0]["candidate"], "v0");
    }
}
