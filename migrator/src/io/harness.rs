//! Validation harness adapter.
//!
//! The [`Harness`] trait decouples the validation gate from the external
//! toolchain (by default `Rscript harness.R`). Tests use scripted harnesses
//! that interpret artifacts in-process.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::dataset::Dataset;
use crate::core::gate::Execution;
use crate::io::config::{HarnessConfig, LintConfig};
use crate::io::fsutil::{to_json_pretty, write_file};
use crate::io::process::{command_from_template, run_command_with_timeout};

/// One execution of an artifact against an input dataset.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteRequest<'a> {
    pub task_id: &'a str,
    pub artifact: &'a str,
    pub input: &'a Dataset,
}

/// Abstraction over artifact execution backends.
pub trait Harness {
    /// Run the artifact. `Err` means the toolchain itself could not run (fatal);
    /// artifact errors, timeouts and bad output are reported in the [`Execution`].
    fn execute(&self, request: &ExecuteRequest<'_>) -> Result<Execution>;

    /// Style issues found in the artifact. Never fails validation by itself.
    fn lint(&self, _task_id: &str, _artifact: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Harness that writes scratch files and spawns the configured command.
#[derive(Debug, Clone)]
pub struct CommandHarness {
    root: PathBuf,
    scratch_dir: PathBuf,
    artifact_extension: String,
    harness: HarnessConfig,
    lint: LintConfig,
}

impl CommandHarness {
    pub fn new(
        root: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        artifact_extension: &str,
        harness: &HarnessConfig,
        lint: &LintConfig,
    ) -> Self {
        Self {
            root: root.into(),
            scratch_dir: scratch_dir.into(),
            artifact_extension: artifact_extension.to_string(),
            harness: harness.clone(),
            lint: lint.clone(),
        }
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.scratch_dir.join(task_id)
    }

    fn write_artifact(&self, task_id: &str, artifact: &str) -> Result<PathBuf> {
        let path = self
            .task_dir(task_id)
            .join(format!("artifact.{}", self.artifact_extension));
        write_file(&path, artifact)?;
        Ok(path)
    }
}

impl Harness for CommandHarness {
    #[instrument(skip_all, fields(task = request.task_id))]
    fn execute(&self, request: &ExecuteRequest<'_>) -> Result<Execution> {
        let dir = self.task_dir(request.task_id);
        let artifact_path = self.write_artifact(request.task_id, request.artifact)?;
        let input_path = dir.join("input.json");
        let output_path = dir.join("output.json");
        write_file(&input_path, &to_json_pretty(request.input)?)?;
        if output_path.exists() {
            fs::remove_file(&output_path)
                .with_context(|| format!("remove stale output {}", output_path.display()))?;
        }

        let cmd = command_from_template(
            &self.harness.command,
            &[
                ("artifact", artifact_path.as_path()),
                ("input", input_path.as_path()),
                ("output", output_path.as_path()),
            ],
            &self.root,
        )?;
        let output = run_command_with_timeout(
            cmd,
            None,
            Duration::from_secs(self.harness.timeout_secs),
            self.harness.output_limit_bytes,
        )
        .context("run validation harness")?;

        let message = output.diagnostic("harness");
        if !output.succeeded() {
            debug!(timed_out = output.timed_out, "artifact execution failed");
            return Ok(Execution {
                success: false,
                message,
                output: None,
            });
        }
        if !output_path.exists() {
            return Ok(Execution {
                success: true,
                message,
                output: None,
            });
        }

        let raw = fs::read_to_string(&output_path)
            .with_context(|| format!("read harness output {}", output_path.display()))?;
        match serde_json::from_str::<Dataset>(&raw) {
            Ok(dataset) => Ok(Execution {
                success: true,
                message,
                output: Some(dataset),
            }),
            Err(err) => Ok(Execution {
                success: false,
                message: format!("result is not a dataset (array of records): {err}\n{message}"),
                output: None,
            }),
        }
    }

    #[instrument(skip_all, fields(task = task_id))]
    fn lint(&self, task_id: &str, artifact: &str) -> Result<Vec<String>> {
        let Some(command) = &self.lint.command else {
            return Ok(Vec::new());
        };
        let artifact_path = self.write_artifact(task_id, artifact)?;
        let cmd = command_from_template(command, &[("artifact", artifact_path.as_path())], &self.root)?;
        let output = match run_command_with_timeout(
            cmd,
            None,
            Duration::from_secs(self.harness.timeout_secs),
            self.harness.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "lint command could not run");
                return Ok(Vec::new());
            }
        };
        if output.timed_out {
            warn!("lint command timed out");
            return Ok(Vec::new());
        }
        Ok(output
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn harness(root: &std::path::Path, script: &str, lint: Option<&str>) -> CommandHarness {
        let config = HarnessConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "harness".to_string(),
                "{artifact}".to_string(),
                "{input}".to_string(),
                "{output}".to_string(),
            ],
            timeout_secs: 10,
            ..HarnessConfig::default()
        };
        let lint = LintConfig {
            command: lint.map(|script| {
                vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    script.to_string(),
                    "lint".to_string(),
                    "{artifact}".to_string(),
                ]
            }),
            blocking: false,
        };
        CommandHarness::new(root, root.join("scratch"), "R", &config, &lint)
    }

    fn input() -> Dataset {
        serde_json::from_value(json!([{"id": 1}, {"id": 2}])).expect("dataset")
    }

    #[test]
    fn successful_run_parses_output_dataset() {
        let temp = tempfile::tempdir().expect("tempdir");
        // Copies input to output: an identity transformation.
        let h = harness(temp.path(), "cp \"$2\" \"$3\"", None);
        let execution = h
            .execute(&ExecuteRequest {
                task_id: "calc",
                artifact: "df",
                input: &input(),
            })
            .expect("execute");
        assert!(execution.success);
        assert_eq!(execution.output, Some(input()));
        assert!(temp.path().join("scratch/calc/artifact.R").is_file());
    }

    #[test]
    fn non_zero_exit_is_a_failed_execution() {
        let temp = tempfile::tempdir().expect("tempdir");
        let h = harness(temp.path(), "echo 'Error: boom' >&2; exit 1", None);
        let execution = h
            .execute(&ExecuteRequest {
                task_id: "calc",
                artifact: "stop('boom')",
                input: &input(),
            })
            .expect("execute");
        assert!(!execution.success);
        assert!(execution.message.contains("Error: boom"));
    }

    #[test]
    fn unparseable_output_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let h = harness(temp.path(), "echo '{\"not\": \"rows\"}' > \"$3\"", None);
        let execution = h
            .execute(&ExecuteRequest {
                task_id: "calc",
                artifact: "x",
                input: &input(),
            })
            .expect("execute");
        assert!(!execution.success);
        assert!(execution.message.contains("not a dataset"));
    }

    #[test]
    fn missing_toolchain_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = HarnessConfig {
            command: vec!["no-such-interpreter-xyz".to_string()],
            ..HarnessConfig::default()
        };
        let h = CommandHarness::new(
            temp.path(),
            temp.path().join("scratch"),
            "R",
            &config,
            &LintConfig::default(),
        );
        let result = h.execute(&ExecuteRequest {
            task_id: "calc",
            artifact: "x",
            input: &input(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn lint_lines_become_issues() {
        let temp = tempfile::tempdir().expect("tempdir");
        let h = harness(
            temp.path(),
            "true",
            Some("printf 'line 1: style\\n\\nline 2: spacing\\n'; exit 1"),
        );
        let issues = h.lint("calc", "x<-1").expect("lint");
        assert_eq!(issues, vec!["line 1: style", "line 2: spacing"]);
    }
}
