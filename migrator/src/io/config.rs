//! Migrator configuration stored under `.migrator/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::gate::GatePolicy;
use crate::core::graph::ReferenceScanner;
use crate::core::manifest::ArtifactLayout;
use crate::core::naming::EntryPointMatcher;
use crate::io::prompt::PromptSettings;

pub const DEFAULT_REFERENCE_PATTERN: &str =
    r#"(?im)^\s*(?:INSERT|INCLUDE)\s+FILE\s*=\s*['"]?([^'"\s]+)['"]?"#;

/// Migrator configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// values suited to an SPSS syntax tree migrated to R.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MigratorConfig {
    /// Directory (relative to the project root) holding the source units.
    pub source_dir: String,
    /// File extension of source units, without the dot. Matched case-insensitively.
    pub source_extension: String,
    /// File extension of generated artifacts, without the dot.
    pub artifact_extension: String,
    /// Language names used in prompts.
    pub source_language: String,
    pub target_language: String,
    /// Regex whose first capture group names a referenced unit.
    pub reference_pattern: String,
    /// Regexes over lowercased unit names that mark entry points.
    pub entry_point_patterns: Vec<String>,
    /// Refinement attempts after the initial draft.
    pub max_retries: u32,
    /// Stop the run when the preflight gate reports a structural defect.
    pub halt_on_critical: bool,
    /// Stop the run after the first task that exhausts its retries.
    pub stop_on_failure: bool,
    /// Entry-point script written by the emit stage.
    pub entry_script: String,

    pub oracle: OracleConfig,
    pub harness: HarnessConfig,
    pub lint: LintConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Command that reads a prompt on stdin and prints the response.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "ollama".to_string(),
                "run".to_string(),
                "qwen2.5-coder".to_string(),
            ],
            timeout_secs: 120,
            output_limit_bytes: 200_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Command executing one artifact. `{artifact}`, `{input}` and `{output}`
    /// are replaced with absolute paths.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
    /// Columns that must never hold negative numbers in a result.
    pub non_negative_fields: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            command: ["Rscript", "harness.R", "{artifact}", "{input}", "{output}"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            timeout_secs: 60,
            output_limit_bytes: 20_000,
            non_negative_fields: vec!["delay_days".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LintConfig {
    /// Optional style checker; `{artifact}` is replaced with the artifact path.
    /// Each non-empty stdout line counts as one issue.
    pub command: Option<Vec<String>>,
    /// Fail validation when the style checker reports issues.
    pub blocking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StateConfig {
    /// Raw baseline dataset, relative to the project root.
    pub baseline: String,
    /// Field whose presence marks an output as a transformation of the Working State.
    pub key_field: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            baseline: "input_data.json".to_string(),
            key_field: "id".to_string(),
        }
    }
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            source_dir: "syntax".to_string(),
            source_extension: "sps".to_string(),
            artifact_extension: "R".to_string(),
            source_language: "SPSS".to_string(),
            target_language: "R".to_string(),
            reference_pattern: DEFAULT_REFERENCE_PATTERN.to_string(),
            entry_point_patterns: vec![
                "^main".to_string(),
                "^master".to_string(),
                "^run_".to_string(),
            ],
            max_retries: 3,
            halt_on_critical: true,
            stop_on_failure: false,
            entry_script: "main.R".to_string(),
            oracle: OracleConfig::default(),
            harness: HarnessConfig::default(),
            lint: LintConfig::default(),
            state: StateConfig::default(),
        }
    }
}

impl MigratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source_dir.trim().is_empty() {
            return Err(anyhow!("source_dir must be non-empty"));
        }
        if self.source_extension.trim().is_empty() || self.source_extension.starts_with('.') {
            return Err(anyhow!("source_extension must be non-empty and without a dot"));
        }
        if self.artifact_extension.trim().is_empty() || self.artifact_extension.starts_with('.') {
            return Err(anyhow!(
                "artifact_extension must be non-empty and without a dot"
            ));
        }
        let pattern = Regex::new(&self.reference_pattern)
            .map_err(|err| anyhow!("reference_pattern is not a valid regex: {err}"))?;
        if pattern.captures_len() < 2 {
            return Err(anyhow!("reference_pattern must have a capture group"));
        }
        for entry in &self.entry_point_patterns {
            Regex::new(entry)
                .map_err(|err| anyhow!("entry_point_patterns: invalid regex '{entry}': {err}"))?;
        }
        if self.entry_script.trim().is_empty() {
            return Err(anyhow!("entry_script must be non-empty"));
        }
        validate_command("oracle.command", &self.oracle.command)?;
        validate_command("harness.command", &self.harness.command)?;
        if let Some(lint) = &self.lint.command {
            validate_command("lint.command", lint)?;
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.harness.timeout_secs == 0 {
            return Err(anyhow!("harness.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        if self.harness.output_limit_bytes == 0 {
            return Err(anyhow!("harness.output_limit_bytes must be > 0"));
        }
        if self.state.baseline.trim().is_empty() {
            return Err(anyhow!("state.baseline must be non-empty"));
        }
        if self.state.key_field.trim().is_empty() {
            return Err(anyhow!("state.key_field must be non-empty"));
        }
        Ok(())
    }

    pub fn scanner(&self) -> Result<ReferenceScanner> {
        ReferenceScanner::new(&self.reference_pattern).context("compile reference_pattern")
    }

    pub fn entry_points(&self) -> Result<EntryPointMatcher> {
        EntryPointMatcher::new(&self.entry_point_patterns).context("compile entry_point_patterns")
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout {
            artifact_extension: self.artifact_extension.clone(),
            ..ArtifactLayout::default()
        }
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            non_negative_fields: self.harness.non_negative_fields.clone(),
            lint_blocking: self.lint.blocking,
            message_limit: self.harness.output_limit_bytes,
        }
    }

    pub fn prompt_settings(&self) -> PromptSettings {
        PromptSettings {
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            key_field: Some(self.state.key_field.clone()),
            max_retries: self.max_retries,
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.timeout_secs)
    }

    pub fn harness_timeout(&self) -> Duration {
        Duration::from_secs(self.harness.timeout_secs)
    }
}

fn validate_command(name: &str, command: &[String]) -> Result<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("{name} must be a non-empty array")),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `MigratorConfig::default()`.
pub fn load_config(path: &Path) -> Result<MigratorConfig> {
    if !path.exists() {
        let cfg = MigratorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MigratorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &MigratorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::fsutil::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, MigratorConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = MigratorConfig::default();
        cfg.lint.command = Some(vec!["lintr".to_string(), "{artifact}".to_string()]);
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_retries = 5\n\n[state]\nkey_field = \"row_id\"\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.state.key_field, "row_id");
        assert_eq!(cfg.state.baseline, "input_data.json");
        assert_eq!(cfg.harness, HarnessConfig::default());
    }

    #[test]
    fn rejects_pattern_without_capture_group() {
        let cfg = MigratorConfig {
            reference_pattern: "INSERT FILE".to_string(),
            ..MigratorConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("capture group"));
    }

    #[test]
    fn rejects_empty_commands() {
        let mut cfg = MigratorConfig::default();
        cfg.harness.command.clear();
        assert!(cfg.validate().is_err());
    }
}
