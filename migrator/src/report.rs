//! Per-task status report.

use crate::core::manifest::{Manifest, Task};
use crate::core::types::{Role, TaskStatus};

/// One line of the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub role: Role,
    pub status: TaskStatus,
    pub attempts: u32,
    pub note: Option<String>,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            role: task.role,
            status: task.status,
            attempts: task.attempts,
            note: task.note.clone(),
        }
    }
}

pub fn task_rows(manifest: &Manifest) -> Vec<TaskRow> {
    manifest.tasks.iter().map(TaskRow::from).collect()
}

/// Fixed-width table: id, role, status, attempts, note.
pub fn render_table(rows: &[TaskRow]) -> String {
    let id_width = rows
        .iter()
        .map(|row| row.id.len())
        .chain(std::iter::once("TASK".len()))
        .max()
        .unwrap_or_default();

    let mut buf = format!(
        "{:<id_width$}  {:<10}  {:<9}  {:>8}  NOTE\n",
        "TASK", "ROLE", "STATUS", "ATTEMPTS"
    );
    for row in rows {
        let note = row
            .note
            .as_deref()
            .and_then(|note| note.lines().next())
            .unwrap_or("");
        let line = format!(
            "{:<id_width$}  {:<10}  {:<9}  {:>8}  {note}",
            row.id,
            row.role.as_str(),
            row.status.as_str(),
            row.attempts
        );
        buf.push_str(line.trim_end());
        buf.push('\n');
    }
    buf
}

/// One-line count of tasks per status, e.g. `3 tasks: 2 validated, 1 failed`.
pub fn render_summary(manifest: &Manifest) -> String {
    let counts: Vec<String> = [
        TaskStatus::Validated,
        TaskStatus::Failed,
        TaskStatus::Drafted,
        TaskStatus::Specified,
        TaskStatus::Pending,
    ]
    .into_iter()
    .map(|status| (status, manifest.count(status)))
    .filter(|(_, count)| *count > 0)
    .map(|(status, count)| format!("{count} {status}"))
    .collect();
    let total = manifest.tasks.len();
    if counts.is_empty() {
        return format!("{total} tasks");
    }
    format!("{total} tasks: {}", counts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{ArtifactLayout, MANIFEST_VERSION};

    fn manifest() -> Manifest {
        let task = |id: &str, role, status, attempts, note: Option<&str>| Task {
            id: id.to_string(),
            source: format!("syntax/{id}.sps"),
            role,
            status,
            artifacts: ArtifactLayout::default().paths_for(id),
            attempts,
            note: note.map(str::to_string),
        };
        Manifest {
            version: MANIFEST_VERSION,
            complete: true,
            warnings: Vec::new(),
            tasks: vec![
                task("calc_delays", Role::Logic, TaskStatus::Validated, 1, None),
                task(
                    "clean",
                    Role::Logic,
                    TaskStatus::Failed,
                    3,
                    Some("task clean exhausted refinement\nsecond line"),
                ),
                task("main", Role::Controller, TaskStatus::Specified, 0, None),
            ],
        }
    }

    #[test]
    fn table_aligns_columns_and_keeps_first_note_line() {
        let table = render_table(&task_rows(&manifest()));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines,
            vec![
                "TASK         ROLE        STATUS     ATTEMPTS  NOTE",
                "calc_delays  logic       validated         1",
                "clean        logic       failed            3  task clean exhausted refinement",
                "main         controller  specified         0",
            ]
        );
    }

    #[test]
    fn summary_counts_statuses() {
        assert_eq!(
            render_summary(&manifest()),
            "3 tasks: 1 validated, 1 failed, 1 specified"
        );
    }
}
