//! Initialization helpers for `.migrator/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{MigratorConfig, write_config};
use super::fsutil::write_file;
use super::run_state::{RunState, write_run_state};

/// All canonical paths within `.migrator/` for a project root.
#[derive(Debug, Clone)]
pub struct MigratorPaths {
    pub root: PathBuf,
    pub migrator_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub manifest_path: PathBuf,
    pub state_dir: PathBuf,
    pub run_state_path: PathBuf,
    pub working_state_path: PathBuf,
    pub snapshots_dir: PathBuf,
    pub traces_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub architecture_path: PathBuf,
}

impl MigratorPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let migrator_dir = root.join(".migrator");
        let state_dir = migrator_dir.join("state");
        Self {
            root: root.clone(),
            migrator_dir: migrator_dir.clone(),
            gitignore_path: migrator_dir.join(".gitignore"),
            config_path: migrator_dir.join("config.toml"),
            manifest_path: migrator_dir.join("manifest.json"),
            state_dir: state_dir.clone(),
            run_state_path: state_dir.join("run_state.json"),
            working_state_path: state_dir.join("working.json"),
            snapshots_dir: migrator_dir.join("snapshots"),
            traces_dir: migrator_dir.join("traces"),
            scratch_dir: migrator_dir.join("scratch"),
            architecture_path: root.join("architecture.md"),
        }
    }

    /// Resolve a `/`-separated project-relative path (as stored in the manifest).
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing migrator-owned files.
    pub force: bool,
}

/// Create `.migrator/` scaffolding in `root` with the default configuration.
///
/// Fails if `.migrator/` already exists unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<MigratorPaths> {
    let paths = MigratorPaths::new(root);
    if paths.migrator_dir.exists() && !options.force {
        return Err(anyhow!(
            "migrator init: .migrator already exists (use --force to overwrite)"
        ));
    }
    if paths.migrator_dir.exists() && !paths.migrator_dir.is_dir() {
        return Err(anyhow!(
            "migrator init: .migrator exists but is not a directory"
        ));
    }

    let cfg = MigratorConfig::default();
    create_dir(&paths.migrator_dir)?;
    create_dir(&paths.state_dir)?;
    create_dir(&paths.snapshots_dir)?;
    create_dir(&paths.traces_dir)?;
    create_dir(&paths.scratch_dir)?;
    create_dir(&paths.resolve(&cfg.source_dir))?;

    write_file(&paths.gitignore_path, MIGRATOR_GITIGNORE)?;
    write_config(&paths.config_path, &cfg)?;
    write_run_state(&paths.run_state_path, &RunState::default())?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

/// Entries `.migrator/.gitignore` must contain.
pub const GITIGNORE_ENTRIES: [&str; 3] = ["state/working.json", "traces/", "scratch/"];

const MIGRATOR_GITIGNORE: &str = "state/working.json\ntraces/\nscratch/\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();

        let paths = init_project(root, &InitOptions { force: false }).expect("init");

        assert!(paths.migrator_dir.is_dir());
        assert!(paths.state_dir.is_dir());
        assert!(paths.snapshots_dir.is_dir());
        assert!(paths.traces_dir.is_dir());
        assert!(paths.scratch_dir.is_dir());
        assert!(root.join("syntax").is_dir());
        assert!(paths.config_path.is_file());
        assert!(paths.run_state_path.is_file());
        assert!(!paths.manifest_path.exists());

        let gitignore = fs::read_to_string(&paths.gitignore_path).expect("read");
        assert!(
            GITIGNORE_ENTRIES
                .iter()
                .all(|entry| gitignore.lines().any(|line| line == *entry))
        );
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            MigratorConfig::default()
        );
    }

    #[test]
    fn init_without_force_refuses_existing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_project(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_project(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_restores_default_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions { force: false }).expect("init");
        fs::write(&paths.config_path, "max_retries = 9\n").expect("write custom");

        init_project(temp.path(), &InitOptions { force: true }).expect("re-init");
        let cfg = load_config(&paths.config_path).expect("config");
        assert_eq!(cfg.max_retries, 3);
    }

    #[test]
    fn resolve_joins_manifest_paths() {
        let paths = MigratorPaths::new("/project");
        assert_eq!(
            paths.resolve("out/calc.R"),
            Path::new("/project").join("out").join("calc.R")
        );
    }
}
