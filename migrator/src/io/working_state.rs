//! Working State owned by the [`Propagator`].
//!
//! The propagator holds the in-memory dataset and mirrors it to
//! `.migrator/state/working.json` for inspection. Nothing else reads or writes
//! that file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::dataset::{Dataset, StatePredicate};
use crate::io::fsutil::{to_json_pretty, write_atomic};

/// Result of offering a task output to the propagator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// Working State replaced by the output.
    Updated { rows: usize, fields: usize },
    /// Output rejected by the predicate (e.g. a summary report).
    Untouched,
}

#[derive(Debug)]
pub struct Propagator<P> {
    path: PathBuf,
    predicate: P,
    current: Dataset,
}

impl<P: StatePredicate> Propagator<P> {
    /// Start a run: Working State becomes `baseline`.
    pub fn reset(path: impl Into<PathBuf>, baseline: Dataset, predicate: P) -> Result<Self> {
        let propagator = Self {
            path: path.into(),
            predicate,
            current: baseline,
        };
        propagator.persist()?;
        info!(
            rows = propagator.current.row_count(),
            fields = propagator.current.fields().len(),
            "working state reset to baseline"
        );
        Ok(propagator)
    }

    pub fn current(&self) -> &Dataset {
        &self.current
    }

    /// Replace Working State with `output` if the predicate admits it.
    pub fn propagate(&mut self, task_id: &str, output: Dataset) -> Result<Propagation> {
        if !self.predicate.admits(&output) {
            info!(
                task = task_id,
                predicate = %self.predicate.describe(),
                "output is not a transformation; working state untouched"
            );
            return Ok(Propagation::Untouched);
        }
        let rows = output.row_count();
        let fields = output.fields().len();
        debug!(
            task = task_id,
            rows_before = self.current.row_count(),
            rows,
            fields,
            "propagating output"
        );
        self.current = output;
        self.persist()?;
        Ok(Propagation::Updated { rows, fields })
    }

    /// End of run: remove the scratch file and return the final state.
    pub fn clear(self) -> Result<Dataset> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("remove working state {}", self.path.display()))?;
        }
        Ok(self.current)
    }

    fn persist(&self) -> Result<()> {
        write_atomic(&self.path, &to_json_pretty(&self.current)?)
    }
}

/// Load the raw baseline dataset.
pub fn load_baseline(path: &Path) -> Result<Dataset> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read baseline {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse baseline {} as an array of records", path.display()))
}
