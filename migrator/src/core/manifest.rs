//! Manifest model: the ordered, persisted list of tasks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::graph::{DependencyGraph, SourceUnit};
use super::naming::{EntryPointMatcher, classify, unique_task_ids};
use super::schedule::Schedule;
use super::types::{Role, TaskStatus};

pub const MANIFEST_VERSION: u32 = 1;

/// Artifact locations of one task, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub spec: String,
    pub draft: String,
    #[serde(rename = "final")]
    pub final_: String,
}

/// One manifest entry per source unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Source unit path relative to the project root.
    pub source: String,
    pub role: Role,
    pub status: TaskStatus,
    pub artifacts: ArtifactPaths,
    /// Refinement attempts spent in the most recent run of this task.
    #[serde(default)]
    pub attempts: u32,
    /// Last diagnostic for failed tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// False when scheduling had to fall back (cycle or unreachable units).
    pub complete: bool,
    pub warnings: Vec<String>,
    pub tasks: Vec<Task>,
}

impl Manifest {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// `(id, role)` pairs in manifest order.
    pub fn identity(&self) -> Vec<(&str, Role)> {
        self.tasks.iter().map(|t| (t.id.as_str(), t.role)).collect()
    }
}

/// Where per-task artifacts live, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub spec_dir: String,
    pub draft_dir: String,
    pub final_dir: String,
    pub artifact_extension: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            spec_dir: "specs".to_string(),
            draft_dir: "drafts".to_string(),
            final_dir: "out".to_string(),
            artifact_extension: "R".to_string(),
        }
    }
}

impl ArtifactLayout {
    pub fn paths_for(&self, id: &str) -> ArtifactPaths {
        ArtifactPaths {
            spec: format!("{}/{id}.md", self.spec_dir),
            draft: format!("{}/{id}.{}", self.draft_dir, self.artifact_extension),
            final_: format!("{}/{id}.{}", self.final_dir, self.artifact_extension),
        }
    }
}

/// Build a fresh manifest (all tasks `pending`) in schedule order.
///
/// `units` may be in any order; it is looked up by key, and the first unit
/// wins when two share a key.
pub fn build_manifest(
    units: &[SourceUnit],
    graph: &DependencyGraph,
    schedule: &Schedule,
    entry_points: &EntryPointMatcher,
    layout: &ArtifactLayout,
) -> Manifest {
    let mut by_key: BTreeMap<&str, &SourceUnit> = BTreeMap::new();
    for unit in units {
        by_key.entry(unit.key.as_str()).or_insert(unit);
    }
    let scheduled: Vec<&SourceUnit> = schedule
        .order
        .iter()
        .filter_map(|key| by_key.get(key.as_str()).copied())
        .collect();
    let ids = unique_task_ids(scheduled.iter().map(|u| u.name.as_str()));

    let tasks = scheduled
        .iter()
        .zip(ids)
        .map(|(unit, id)| Task {
            role: classify(&unit.name, graph.references_others(&unit.key), entry_points),
            source: unit.path.clone(),
            status: TaskStatus::Pending,
            artifacts: layout.paths_for(&id),
            attempts: 0,
            note: None,
            id,
        })
        .collect();

    let mut warnings: Vec<String> = graph.warnings().iter().map(ToString::to_string).collect();
    if let Some(warning) = schedule.warning() {
        warnings.push(warning.to_string());
    }

    Manifest {
        version: MANIFEST_VERSION,
        complete: schedule.is_complete(),
        warnings,
        tasks,
    }
}

/// Carry progress from `previous` into `fresh` for tasks whose id and source survive.
#[must_use]
pub fn merge_progress(mut fresh: Manifest, previous: &Manifest) -> Manifest {
    for task in &mut fresh.tasks {
        let Some(old) = previous.task(&task.id) else {
            continue;
        };
        if old.source != task.source || old.role != task.role {
            continue;
        }
        task.status = old.status;
        task.attempts = old.attempts;
        task.note = old.note.clone();
    }
    fresh
}
