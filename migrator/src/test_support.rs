//! Test doubles and project fixtures shared by unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::dataset::{Dataset, Row};
use crate::core::gate::Execution;
use crate::core::manifest::{ArtifactLayout, Task};
use crate::core::refine::Oracle;
use crate::core::types::{Role, TaskStatus};
use crate::io::config::{MigratorConfig, write_config};
use crate::io::fsutil::{to_json_pretty, write_file};
use crate::io::harness::{ExecuteRequest, Harness};
use crate::io::init::{InitOptions, MigratorPaths, init_project};

/// Build a dataset from a JSON array literal.
pub fn dataset(value: Value) -> Dataset {
    serde_json::from_value(value).expect("dataset literal")
}

/// Oracle that replays queued responses and records every prompt.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: RefCell<VecDeque<Option<String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<Option<String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Every response succeeds with the given text.
    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| Some((*text).to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn assert_drained(&self) {
        let left = self.responses.borrow().len();
        assert_eq!(left, 0, "{left} scripted oracle response(s) never requested");
    }
}

impl Oracle for ScriptedOracle {
    fn generate(&self, prompt: &str) -> Option<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected oracle call:\n{prompt}"))
    }
}

/// In-process harness interpreting a tiny line language.
///
/// Each non-blank line not starting with `#` is one instruction, applied in
/// order to a copy of the input:
///
/// - `crash`: the toolchain itself fails (`Err`)
/// - `fail: <message>`: runtime error with `<message>`
/// - `keep <n>`: keep the first `n` rows
/// - `add <field> <value>`: set `field` to the JSON `value` on every row
/// - `negative <field>`: set `field` to `-1` on every row
/// - `summary`: replace the rows with `[{"n": <row count>}]`
/// - `empty`: return no rows
/// - `none`: write no output at all
/// - `style <issue>`: reported by `lint`, ignored by `execute`
#[derive(Debug, Default)]
pub struct MiniHarness {
    broken: bool,
    executions: Cell<u32>,
    inputs: RefCell<Vec<SeenInput>>,
}

/// Shape of one dataset handed to [`MiniHarness::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenInput {
    pub task_id: String,
    pub rows: usize,
    pub fields: usize,
}

impl MiniHarness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Harness whose toolchain never runs.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn executions(&self) -> u32 {
        self.executions.get()
    }

    /// Inputs seen for `task_id`, oldest first.
    pub fn inputs_for(&self, task_id: &str) -> Vec<SeenInput> {
        self.inputs
            .borrow()
            .iter()
            .filter(|seen| seen.task_id == task_id)
            .cloned()
            .collect()
    }
}

fn instructions(artifact: &str) -> impl Iterator<Item = &str> {
    artifact
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

impl Harness for MiniHarness {
    fn execute(&self, request: &ExecuteRequest<'_>) -> Result<Execution> {
        self.executions.set(self.executions.get() + 1);
        self.inputs.borrow_mut().push(SeenInput {
            task_id: request.task_id.to_string(),
            rows: request.input.row_count(),
            fields: request.input.fields().len(),
        });
        if self.broken {
            return Err(anyhow!("interpreter not found"));
        }

        let mut rows: Vec<Row> = request.input.rows().to_vec();
        let mut output = true;
        for line in instructions(request.artifact) {
            let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
            match op {
                "crash" => return Err(anyhow!("toolchain crashed")),
                "fail:" => {
                    return Ok(Execution {
                        success: false,
                        message: format!("Error: {}", rest.trim()),
                        output: None,
                    });
                }
                "keep" => {
                    let n: usize = rest.trim().parse()?;
                    rows.truncate(n);
                }
                "add" => {
                    let (field, value) = rest
                        .trim()
                        .split_once(' ')
                        .ok_or_else(|| anyhow!("add needs a field and a value: {line}"))?;
                    let value: Value = serde_json::from_str(value.trim())?;
                    for row in &mut rows {
                        row.insert(field.to_string(), value.clone());
                    }
                }
                "negative" => {
                    for row in &mut rows {
                        row.insert(rest.trim().to_string(), Value::from(-1));
                    }
                }
                "summary" => {
                    let mut row = Row::new();
                    row.insert("n".to_string(), Value::from(rows.len()));
                    rows = vec![row];
                }
                "empty" => rows.clear(),
                "none" => output = false,
                _ => {}
            }
        }

        Ok(Execution {
            success: true,
            message: String::new(),
            output: output.then(|| Dataset::new(rows)),
        })
    }

    fn lint(&self, _task_id: &str, artifact: &str) -> Result<Vec<String>> {
        Ok(instructions(artifact)
            .filter_map(|line| line.strip_prefix("style "))
            .map(str::to_string)
            .collect())
    }
}

/// Temporary project with `.migrator/` scaffolding and the default config.
#[derive(Debug)]
pub struct TestProject {
    _temp: TempDir,
    paths: MigratorPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = init_project(temp.path(), &InitOptions { force: false })?;
        Ok(Self { _temp: temp, paths })
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn paths(&self) -> &MigratorPaths {
        &self.paths
    }

    /// Write a source unit into the default source directory.
    pub fn add_source(&self, name: &str, content: &str) -> Result<()> {
        let cfg = MigratorConfig::default();
        let path = self.paths.resolve(&cfg.source_dir).join(name);
        write_file(&path, content)
    }

    /// Write the baseline dataset at the default location.
    pub fn write_baseline(&self, rows: Value) -> Result<()> {
        let cfg = MigratorConfig::default();
        write_file(&self.paths.resolve(&cfg.state.baseline), &to_json_pretty(&rows)?)
    }

    pub fn write_config(&self, cfg: &MigratorConfig) -> Result<()> {
        write_config(&self.paths.config_path, cfg)
    }

    /// A logic task with its spec and draft on disk, ready for refinement.
    pub fn drafted_task(&self, id: &str, spec: &str, draft: &str) -> Result<Task> {
        let artifacts = ArtifactLayout::default().paths_for(id);
        write_file(&self.paths.resolve(&artifacts.spec), &format!("{spec}\n"))?;
        write_file(&self.paths.resolve(&artifacts.draft), &format!("{draft}\n"))?;
        Ok(Task {
            id: id.to_string(),
            source: format!("syntax/{id}.sps"),
            role: Role::Logic,
            status: TaskStatus::Drafted,
            artifacts,
            attempts: 0,
            note: None,
        })
    }
}
