//! Task identifiers and role classification.

use std::collections::BTreeSet;

use regex::Regex;

use super::types::Role;

/// Derive a task id from a unit file name.
///
/// Lowercases, strips the extension and any leading ordering prefix made of
/// digits and underscores, and maps every other non-alphanumeric character to
/// `_`. Falls back to the sanitized stem when nothing is left.
pub fn task_id(unit_name: &str) -> String {
    let lowered = unit_name.trim().to_lowercase();
    let stem = lowered
        .rsplit_once('.')
        .map_or(lowered.as_str(), |(stem, _)| stem);
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let stripped = sanitized.trim_start_matches(|c: char| c.is_ascii_digit() || c == '_');
    if stripped.is_empty() {
        let fallback = sanitized.trim_matches('_');
        if fallback.is_empty() {
            return "unit".to_string();
        }
        return format!("unit_{fallback}");
    }
    stripped.to_string()
}

/// Assign ids in order, suffixing collisions with `_2`, `_3`, ...
pub fn unique_task_ids<'a>(unit_names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = BTreeSet::new();
    let mut ids = Vec::new();
    for name in unit_names {
        let base = task_id(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        taken.insert(candidate.clone());
        ids.push(candidate);
    }
    ids
}

/// Naming convention that marks entry-point units.
#[derive(Debug, Clone)]
pub struct EntryPointMatcher {
    patterns: Vec<Regex>,
}

impl EntryPointMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Matches against the lowercased unit name.
    pub fn is_entry_point(&self, unit_name: &str) -> bool {
        let lowered = unit_name.to_lowercase();
        self.patterns.iter().any(|p| p.is_match(&lowered))
    }
}

/// Controller if the unit references other units or is named like an entry point.
pub fn classify(unit_name: &str, references_others: bool, entry_points: &EntryPointMatcher) -> Role {
    if references_others || entry_points.is_entry_point(unit_name) {
        Role::Controller
    } else {
        Role::Logic
    }
}
