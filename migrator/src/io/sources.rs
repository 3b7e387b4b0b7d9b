//! Discovery of source units on disk.

use std::fs;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::graph::SourceUnit;
use crate::io::config::MigratorConfig;
use crate::io::init::MigratorPaths;

/// Read every source unit in the configured source directory, sorted by name.
///
/// Only direct children whose extension matches `source_extension`
/// (case-insensitively) are considered. Content that is not valid UTF-8 is
/// decoded lossily; legacy scripts are often Latin-1.
pub fn discover_units(paths: &MigratorPaths, cfg: &MigratorConfig) -> Result<Vec<SourceUnit>> {
    let source_dir = paths.resolve(&cfg.source_dir);
    if !source_dir.is_dir() {
        return Err(anyhow!(
            "source directory {} does not exist",
            source_dir.display()
        ));
    }
    let prefix = cfg.source_dir.trim_end_matches('/');
    let wanted = cfg.source_extension.to_lowercase();

    let mut units = Vec::new();
    let entries = fs::read_dir(&source_dir)
        .with_context(|| format!("read directory {}", source_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", source_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.to_lowercase() == wanted);
        if !matches_extension {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            debug!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        units.push(SourceUnit::new(name, format!("{prefix}/{name}"), content));
    }
    units.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(units = units.len(), dir = %source_dir.display(), "discovered source units");
    Ok(units)
}
