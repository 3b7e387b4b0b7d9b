//! Append-only snapshot store under `.migrator/snapshots/<task>/`.
//!
//! Each snapshot is one JSON file named `<seq>-<label>.json`, created with
//! `create_new` so an existing snapshot is never overwritten.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::fsutil::to_json_pretty;

/// Immutable copy of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub task_id: String,
    pub label: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Position in the task's snapshot sequence (1-based).
    pub seq: u32,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.dir.join(task_id)
    }

    /// Record a new snapshot of `content`.
    pub fn take(&self, task_id: &str, label: &str, content: &str) -> Result<Snapshot> {
        if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(anyhow!("invalid snapshot label '{label}'"));
        }
        let dir = self.task_dir(task_id);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let seq = self.entries(task_id)?.last().map_or(0, |entry| entry.0) + 1;
        let snapshot = Snapshot {
            task_id: task_id.to_string(),
            label: label.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            seq,
            content: content.to_string(),
        };

        let path = dir.join(format!("{seq:04}-{label}.json"));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("create snapshot {}", path.display()))?;
        file.write_all(to_json_pretty(&snapshot)?.as_bytes())
            .with_context(|| format!("write snapshot {}", path.display()))?;
        debug!(task = task_id, label, seq, "snapshot taken");
        Ok(snapshot)
    }

    /// All snapshots of a task, oldest first.
    pub fn list(&self, task_id: &str) -> Result<Vec<Snapshot>> {
        self.entries(task_id)?
            .into_iter()
            .map(|(_, _, path)| read_snapshot(&path))
            .collect()
    }

    /// Most recent snapshot with `label`.
    pub fn latest(&self, task_id: &str, label: &str) -> Result<Option<Snapshot>> {
        let Some((_, _, path)) = self
            .entries(task_id)?
            .into_iter()
            .rev()
            .find(|(_, entry_label, _)| entry_label == label)
        else {
            return Ok(None);
        };
        read_snapshot(&path).map(Some)
    }

    /// `(seq, label, path)` of every snapshot file, ordered by sequence.
    fn entries(&self, task_id: &str) -> Result<Vec<(u32, String, PathBuf)>> {
        let dir = self.task_dir(task_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry
                .with_context(|| format!("read entry in {}", dir.display()))?
                .path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((seq, label)) = name
                .strip_suffix(".json")
                .and_then(|stem| stem.split_once('-'))
                .and_then(|(seq, label)| Some((seq.parse::<u32>().ok()?, label.to_string())))
            else {
                continue;
            };
            entries.push((seq, label, path));
        }
        entries.sort();
        Ok(entries)
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_sequenced_and_listed_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(temp.path());
        store.take("calc", "pre-run", "v0").expect("pre-run");
        store.take("calc", "success", "v1").expect("success");
        store.take("calc", "pre-run", "v1").expect("second pre-run");

        let all = store.list("calc").expect("list");
        let seqs: Vec<(u32, &str, &str)> = all
            .iter()
            .map(|s| (s.seq, s.label.as_str(), s.content.as_str()))
            .collect();
        assert_eq!(
            seqs,
            vec![(1, "pre-run", "v0"), (2, "success", "v1"), (3, "pre-run", "v1")]
        );
        assert!(temp.path().join("calc/0002-success.json").is_file());
    }

    #[test]
    fn latest_finds_most_recent_label() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(temp.path());
        assert_eq!(store.latest("calc", "success").expect("latest"), None);
        store.take("calc", "success", "old").expect("take");
        store.take("calc", "pre-run", "x").expect("take");
        store.take("calc", "success", "new").expect("take");

        let latest = store.latest("calc", "success").expect("latest").expect("some");
        assert_eq!(latest.content, "new");
    }

    #[test]
    fn existing_snapshot_file_is_never_overwritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(temp.path());
        fs::create_dir_all(temp.path().join("calc")).expect("mkdir");
        // A pre-existing entry already holds seq 1.
        fs::write(temp.path().join("calc/0001-pre-run.json"), "{}").expect("write");
        fs::write(temp.path().join("calc/notes.txt"), "ignored").expect("write");

        let snapshot = store.take("calc", "pre-run", "v0").expect("take");
        assert_eq!(snapshot.seq, 2);
        assert_eq!(
            fs::read_to_string(temp.path().join("calc/0001-pre-run.json")).expect("read"),
            "{}"
        );
    }

    #[test]
    fn rejects_labels_that_would_escape_the_name_scheme() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(temp.path());
        assert!(store.take("calc", "../x", "v").is_err());
        assert!(store.take("calc", "", "v").is_err());
    }
}
