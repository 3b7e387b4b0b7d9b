//! Manifest load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_manifest_invariants;
use crate::core::manifest::Manifest;
use crate::io::fsutil::{to_json_pretty, write_atomic};

pub const MANIFEST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/manifest/v1.schema.json"
));

/// Load and validate the manifest from disk (schema + invariants).
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse manifest {}", path.display()))?;
    validate_schema(&value)?;
    let manifest: Manifest = serde_json::from_value(value)
        .with_context(|| format!("deserialize manifest {}", path.display()))?;
    let errors = validate_manifest_invariants(&manifest);
    if !errors.is_empty() {
        return Err(anyhow!("manifest invariants failed: {}", errors.join("; ")));
    }
    debug!(path = %path.display(), tasks = manifest.tasks.len(), "manifest loaded");
    Ok(manifest)
}

/// Canonical serialized form (pretty JSON, trailing newline).
pub fn render_manifest(manifest: &Manifest) -> Result<String> {
    to_json_pretty(manifest)
}

/// Atomically write the manifest (temp file + rename).
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let errors = validate_manifest_invariants(manifest);
    if !errors.is_empty() {
        return Err(anyhow!(
            "refusing to write invalid manifest: {}",
            errors.join("; ")
        ));
    }
    write_atomic(path, &render_manifest(manifest)?)
}

fn validate_schema(manifest: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).context("parse manifest schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(manifest) {
        let messages = compiled
            .iter_errors(manifest)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "manifest schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
