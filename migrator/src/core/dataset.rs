//! Tabular dataset threaded through logic tasks, plus the propagation predicate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// Row-oriented dataset: a JSON array of objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of field names across all rows.
    pub fn fields(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    /// True if every row carries `field`.
    pub fn every_row_has(&self, field: &str) -> bool {
        self.rows.iter().all(|row| row.contains_key(field))
    }

    /// Indices of rows whose numeric `field` is negative.
    pub fn negative_rows(&self, field: &str) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.get(field)
                    .and_then(Value::as_f64)
                    .is_some_and(|v| v < 0.0)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Decides whether a task output may replace the Working State.
pub trait StatePredicate {
    fn admits(&self, output: &Dataset) -> bool;

    /// Human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Output is a transformation (not a report) if it is non-empty and every row
/// keeps the designated key field. Row count and the remaining fields are free
/// to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableKey {
    pub field: String,
}

impl StableKey {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl StatePredicate for StableKey {
    fn admits(&self, output: &Dataset) -> bool {
        !output.is_empty() && output.every_row_has(&self.field)
    }

    fn describe(&self) -> String {
        format!("stable key '{}'", self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(value: Value) -> Dataset {
        serde_json::from_value(value).expect("dataset")
    }

    #[test]
    fn fields_and_rows_are_reported() {
        let data = dataset(json!([
            {"id": 1, "delay_days": 3},
            {"id": 2, "delay_days": -1, "extra": true}
        ]));
        assert_eq!(data.row_count(), 2);
        assert_eq!(
            data.fields().into_iter().collect::<Vec<_>>(),
            vec!["delay_days", "extra", "id"]
        );
        assert_eq!(data.negative_rows("delay_days"), vec![1]);
        assert!(data.negative_rows("missing").is_empty());
    }

    #[test]
    fn stable_key_admits_enrichment_with_fewer_rows() {
        let predicate = StableKey::new("id");
        let enriched = dataset(json!([
            {"id": 1, "a": 1, "b": "x"},
            {"id": 2, "a": 2, "b": "y"},
            {"id": 4, "a": 4, "b": "z"}
        ]));
        assert!(predicate.admits(&enriched));
    }

    #[test]
    fn stable_key_rejects_summaries_and_empty_outputs() {
        let predicate = StableKey::new("id");
        let summary = dataset(json!([{"group": "a", "mean_delay": 2.5}]));
        let partial = dataset(json!([{"id": 1}, {"mean": 2}]));
        assert!(!predicate.admits(&summary));
        assert!(!predicate.admits(&partial));
        assert!(!predicate.admits(&Dataset::default()));
    }
}
