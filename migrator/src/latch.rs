//! Safety latch around one task's committed artifact.
//!
//! Arming takes a `pre-run` snapshot of the current artifact. The latch is then
//! resolved exactly once: [`SafetyLatch::commit`] stores a validated candidate,
//! [`SafetyLatch::revert`] restores the snapshot. Either way the committed file
//! never holds a candidate that failed validation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::io::fsutil::{read_optional, write_atomic};
use crate::io::snapshot::{Snapshot, SnapshotStore};

pub const PRE_RUN_LABEL: &str = "pre-run";
pub const SUCCESS_LABEL: &str = "success";

#[derive(Debug)]
#[must_use = "a latch must be committed or reverted"]
pub struct SafetyLatch<'a> {
    store: &'a SnapshotStore,
    task_id: String,
    committed_path: PathBuf,
    pre_run: Snapshot,
}

impl<'a> SafetyLatch<'a> {
    /// Snapshot the committed artifact at `committed_path`, or `fallback`
    /// (the draft) when nothing has been committed yet.
    pub fn arm(
        store: &'a SnapshotStore,
        task_id: &str,
        committed_path: &Path,
        fallback: &str,
    ) -> Result<Self> {
        let current = read_optional(committed_path)?.unwrap_or_else(|| fallback.to_string());
        let pre_run = store.take(task_id, PRE_RUN_LABEL, &current)?;
        Ok(Self {
            store,
            task_id: task_id.to_string(),
            committed_path: committed_path.to_path_buf(),
            pre_run,
        })
    }

    /// Last known-good artifact, as snapshotted when the latch was armed.
    pub fn known_good(&self) -> &str {
        &self.pre_run.content
    }

    /// Store a validated artifact as the task's committed state.
    pub fn commit(self, artifact: &str) -> Result<Snapshot> {
        let snapshot = self.store.take(&self.task_id, SUCCESS_LABEL, artifact)?;
        write_atomic(&self.committed_path, artifact)?;
        info!(task = %self.task_id, seq = snapshot.seq, "artifact committed");
        Ok(snapshot)
    }

    /// Restore the pre-run snapshot.
    pub fn revert(self) -> Result<Snapshot> {
        write_atomic(&self.committed_path, &self.pre_run.content)?;
        warn!(
            task = %self.task_id,
            seq = self.pre_run.seq,
            "artifact reverted to pre-run snapshot"
        );
        Ok(self.pre_run)
    }
}
