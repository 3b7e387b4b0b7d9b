//! Prompt rendering for oracle calls.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::manifest::Task;
use crate::core::refine::{RefineRequest, RequestBuilder, TaskContext};
use crate::core::types::{FailureRecord, Role};

const SPECIFY_TEMPLATE: &str = include_str!("prompts/specify.md");
const DRAFT_TEMPLATE: &str = include_str!("prompts/draft.md");
const REFINE_TEMPLATE: &str = include_str!("prompts/refine.md");

/// Task fields exposed to templates.
#[derive(Debug, Clone, Serialize)]
struct TaskView<'a> {
    id: &'a str,
    role: Role,
    source: Option<&'a str>,
    spec: Option<&'a str>,
}

/// Language settings shared by every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    pub source_language: String,
    pub target_language: String,
    /// Column the generated code must keep; `None` omits the instruction.
    pub key_field: Option<String>,
    /// Refinement attempts after the initial draft.
    pub max_retries: u32,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
    settings: PromptSettings,
}

impl PromptEngine {
    pub fn new(settings: PromptSettings) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("specify", SPECIFY_TEMPLATE)
            .context("load specify template")?;
        env.add_template("draft", DRAFT_TEMPLATE)
            .context("load draft template")?;
        env.add_template("refine", REFINE_TEMPLATE)
            .context("load refine template")?;
        Ok(Self { env, settings })
    }

    /// Prompt turning a source unit into a Markdown specification.
    pub fn render_specify(&self, task: &Task, source: &str) -> Result<String> {
        let view = TaskView {
            id: &task.id,
            role: task.role,
            source: Some(&task.source),
            spec: None,
        };
        let rendered = self.env.get_template("specify")?.render(context! {
            source_language => &self.settings.source_language,
            task => view,
            source => source.trim_end(),
        })?;
        Ok(rendered)
    }

    /// Prompt turning a specification into the first candidate artifact.
    pub fn render_draft(&self, task: &TaskContext) -> Result<String> {
        let rendered = self.env.get_template("draft")?.render(context! {
            target_language => &self.settings.target_language,
            function_name => &task.id,
            key_field => &self.settings.key_field,
            task => view_of(task),
        })?;
        Ok(rendered)
    }

    fn render_refine(&self, request: &RefineRequest<'_>) -> Result<String> {
        let history: &[FailureRecord] = request.history.records();
        let rendered = self.env.get_template("refine")?.render(context! {
            target_language => &self.settings.target_language,
            function_name => &request.task.id,
            attempt => request.attempt,
            max_attempts => &self.settings.max_retries,
            task => view_of(request.task),
            candidate => request.candidate.trim_end(),
            history => history,
        })?;
        Ok(rendered)
    }
}

fn view_of(task: &TaskContext) -> TaskView<'_> {
    TaskView {
        id: &task.id,
        role: task.role,
        source: None,
        spec: Some(task.spec.trim()),
    }
}

impl RequestBuilder for PromptEngine {
    fn build(&self, request: &RefineRequest<'_>) -> Result<String> {
        self.render_refine(request)
            .with_context(|| format!("render refine prompt for {}", request.task.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::ArtifactLayout;
    use crate::core::types::{FailureHistory, TaskStatus};

    fn engine() -> PromptEngine {
        PromptEngine::new(PromptSettings {
            source_language: "SPSS".to_string(),
            target_language: "R".to_string(),
            key_field: Some("id".to_string()),
            max_retries: 3,
        })
        .expect("engine")
    }

    fn context() -> TaskContext {
        TaskContext {
            id: "calc_delays".to_string(),
            role: Role::Logic,
            spec: "Compute delay_days = end - start.\n".to_string(),
        }
    }

    #[test]
    fn specify_prompt_embeds_source() {
        let task = Task {
            id: "calc_delays".to_string(),
            source: "syntax/01_calc_delays.sps".to_string(),
            role: Role::Logic,
            status: TaskStatus::Pending,
            artifacts: ArtifactLayout::default().paths_for("calc_delays"),
            attempts: 0,
            note: None,
        };
        let prompt = engine()
            .render_specify(&task, "COMPUTE delay_days = end - start.\n")
            .expect("render");
        assert!(prompt.contains("legacy SPSS script"));
        assert!(prompt.contains("`syntax/01_calc_delays.sps`"));
        assert!(prompt.contains("<source>\nCOMPUTE delay_days = end - start.\n</source>"));
    }

    #[test]
    fn draft_prompt_names_function_and_key() {
        let prompt = engine().render_draft(&context()).expect("render");
        assert!(prompt.contains("function named `calc_delays`"));
        assert!(prompt.contains("Keep the `id` column"));
        assert!(prompt.contains("Compute delay_days = end - start."));
    }

    #[test]
    fn refine_prompt_lists_every_prior_attempt_in_order() {
        let history = (0..3).fold(FailureHistory::new(), |h, attempt| {
            h.with(FailureRecord {
                attempt,
                candidate: if attempt == 1 {
                    String::new()
                } else {
                    format!("calc_delays <- function(df) v{attempt}")
                },
                diagnostic: format!("error number {attempt}"),
            })
        });
        let task = context();
        let prompt = engine()
            .build(&RefineRequest {
                task: &task,
                attempt: 3,
                candidate: "calc_delays <- function(df) v2",
                history: &history,
            })
            .expect("render");

        let positions: Vec<usize> = (0..3)
            .map(|n| {
                prompt
                    .find(&format!("error number {n}"))
                    .expect("record present")
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(prompt.contains("(no candidate was produced)"));
        assert!(prompt.contains("Attempt: 3 of 3"));
        assert!(prompt.contains("do not repeat any of those mistakes"));
    }
}
