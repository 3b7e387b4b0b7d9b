//! Task status transitions.
//!
//! ```text
//! pending -> specified -> drafted -> validated
//!    \           \           \          |
//!     +-----------+-----------+------> failed
//! ```
//!
//! `validated` and `failed` logic tasks are refined again on every run, so both
//! may move to either terminal status. A failed task may also be reopened at
//! the stage that failed (see [`resume_status`]).

use super::types::{Role, TaskStatus};

/// Check a status change. Returns the new status when the transition is legal.
pub fn transition(role: Role, from: TaskStatus, to: TaskStatus) -> Result<TaskStatus, String> {
    use TaskStatus::{Drafted, Failed, Pending, Specified, Validated};

    let legal = match (from, to) {
        (_, Failed) => true,
        (Pending, Specified) => true,
        (Specified, Drafted) => role == Role::Logic,
        (Drafted | Validated | Failed, Validated) => role == Role::Logic,
        (Failed, Pending | Specified | Drafted) => true,
        _ => false,
    };
    if legal {
        Ok(to)
    } else {
        Err(format!(
            "illegal {} transition {} -> {}",
            role.as_str(),
            from,
            to
        ))
    }
}

/// Status a failed task restarts from, given which artifacts already exist.
///
/// Non-failed statuses are returned unchanged.
pub fn resume_status(role: Role, status: TaskStatus, has_spec: bool, has_draft: bool) -> TaskStatus {
    if status != TaskStatus::Failed {
        return status;
    }
    match (role, has_spec, has_draft) {
        (_, false, _) => TaskStatus::Pending,
        (Role::Controller, true, _) => TaskStatus::Specified,
        (Role::Logic, true, false) => TaskStatus::Specified,
        (Role::Logic, true, true) => TaskStatus::Failed,
    }
}

/// True if the refine stage should run this task.
pub fn is_refinable(role: Role, status: TaskStatus) -> bool {
    role == Role::Logic
        && matches!(
            status,
            TaskStatus::Drafted | TaskStatus::Validated | TaskStatus::Failed
        )
}
