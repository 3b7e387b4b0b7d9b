//! Subprocess-backed generation oracle.
//!
//! The prompt is written to the command's stdin and the response read from
//! stdout (e.g. `ollama run <model>`). Every failure mode collapses to `None`,
//! which callers treat as a generation failure.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::refine::Oracle;
use crate::io::config::OracleConfig;
use crate::io::process::run_command_with_timeout;

#[derive(Debug, Clone)]
pub struct CommandOracle {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandOracle {
    pub fn new(config: &OracleConfig, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command: config.command.clone(),
            workdir: workdir.into(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl Oracle for CommandOracle {
    #[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str) -> Option<String> {
        let (program, args) = self.command.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.workdir);

        let output = match run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "oracle could not run");
                return None;
            }
        };
        if !output.succeeded() {
            warn!(
                timed_out = output.timed_out,
                exit_code = ?output.status.code(),
                "oracle failed"
            );
            return None;
        }
        if output.stdout_truncated > 0 {
            warn!(truncated = output.stdout_truncated, "oracle response truncated");
        }

        let text = output.stdout_text();
        if text.trim().is_empty() {
            warn!("oracle returned an empty response");
            return None;
        }
        debug!(response_bytes = text.len(), "oracle responded");
        Some(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn oracle(command: &[&str]) -> CommandOracle {
        let config = OracleConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 10,
            output_limit_bytes: 10_000,
        };
        CommandOracle::new(&config, std::env::temp_dir())
    }

    #[test]
    fn echoes_prompt_through_stdin() {
        let response = oracle(&["sh", "-c", "tr a-z A-Z"]).generate("df <- df");
        assert_eq!(response.as_deref(), Some("DF <- DF"));
    }

    #[test]
    fn failures_and_empty_output_are_none() {
        assert_eq!(oracle(&["sh", "-c", "exit 3"]).generate("x"), None);
        assert_eq!(oracle(&["sh", "-c", "cat >/dev/null"]).generate("x"), None);
        assert_eq!(oracle(&["no-such-oracle-binary-xyz"]).generate("x"), None);
    }
}
