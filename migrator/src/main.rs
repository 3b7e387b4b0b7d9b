//! Dependency-aware migration pipeline CLI.
//!
//! Plans a tree of legacy statistical scripts (`.migrator/manifest.json`),
//! drafts target-language artifacts through an external generation command and
//! refines each one against a validation harness in dependency order.

use std::env;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use migrator::exit_codes;
use migrator::io::config::load_config;
use migrator::io::harness::CommandHarness;
use migrator::io::init::{InitOptions, MigratorPaths, init_project};
use migrator::io::manifest_store::load_manifest;
use migrator::io::oracle::CommandOracle;
use migrator::io::run_state::load_run_state;
use migrator::logging;
use migrator::plan::{PlanOptions, plan_project};
use migrator::report::{render_summary, render_table, task_rows};
use migrator::run::{RunOptions, RunStop, run_pipeline};
use migrator::validate::{ManifestValidation, validate_project};

#[derive(Parser)]
#[command(
    name = "migrator",
    version,
    about = "Dependency-aware migration of legacy statistical script trees"
)]
struct Cli {
    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` wins.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.migrator/` scaffolding with the default config.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Scan the source units and write the manifest and `architecture.md`.
    Plan {
        /// Discard progress recorded in the existing manifest.
        #[arg(short, long)]
        force: bool,
    },
    /// Run every stage: plan, specify, draft, preflight, refine, emit.
    Run {
        /// Rebuild the manifest and reset all progress first.
        #[arg(short, long)]
        force: bool,
        /// Refinement attempts after the initial draft (overrides config).
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Print the per-task status table from the manifest.
    Status,
    /// Check layout, config and manifest (schema, invariants, dependency order).
    Validate,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match dispatch(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn dispatch(command: Command) -> Result<i32> {
    let root = env::current_dir().context("resolve current directory")?;
    match command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Plan { force } => cmd_plan(&root, force),
        Command::Run { force, max_retries } => cmd_run(&root, RunOptions { force, max_retries }),
        Command::Status => cmd_status(&root),
        Command::Validate => cmd_validate(&root),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_project(root, &InitOptions { force })?;
    println!("initialized {}", paths.migrator_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_plan(root: &Path, force: bool) -> Result<i32> {
    let paths = MigratorPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let report = plan_project(&paths, &cfg, PlanOptions { force })?;
    println!("{}", render_summary(&report.manifest));
    print_warnings(report.warnings());
    println!("wrote {}", paths.manifest_path.display());
    println!("wrote {}", paths.architecture_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, options: RunOptions) -> Result<i32> {
    let paths = MigratorPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let oracle = CommandOracle::new(&cfg.oracle, root);
    let harness = CommandHarness::new(
        root,
        &paths.scratch_dir,
        &cfg.artifact_extension,
        &cfg.harness,
        &cfg.lint,
    );

    let report = run_pipeline(root, &oracle, &harness, &options)?;
    print!("{}", render_table(&report.rows));
    print_warnings(&report.warnings);
    if let Some(emitted) = &report.emitted {
        println!(
            "wrote {} ({} included, {} skipped)",
            emitted.path.display(),
            emitted.included.len(),
            emitted.skipped.len()
        );
    }

    let code = match &report.stop {
        RunStop::Complete => {
            println!("{}: complete", report.run_id);
            exit_codes::OK
        }
        RunStop::Partial => {
            println!("{}: partial", report.run_id);
            exit_codes::PARTIAL
        }
        RunStop::Halted { stage, reason } => {
            eprintln!("{}: halted in {stage}: {reason}", report.run_id);
            exit_codes::HALTED
        }
    };
    Ok(code)
}

fn cmd_status(root: &Path) -> Result<i32> {
    let paths = MigratorPaths::new(root);
    if !paths.manifest_path.exists() {
        bail!(
            "no manifest at {}; run `migrator plan`",
            paths.manifest_path.display()
        );
    }
    let manifest = load_manifest(&paths.manifest_path)?;
    print!("{}", render_table(&task_rows(&manifest)));
    println!("{}", render_summary(&manifest));

    let run_state = load_run_state(&paths.run_state_path)?;
    if let Some(run_id) = &run_state.run_id {
        println!("run {run_id} did not finish");
    } else if let (Some(run_id), Some(outcome)) = (&run_state.last_run_id, run_state.last_outcome)
    {
        println!("last run {run_id}: {}", outcome.as_str());
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path) -> Result<i32> {
    let outcome = validate_project(root)?;
    match outcome.manifest {
        ManifestValidation::Missing => println!("ok (no manifest yet; run `migrator plan`)"),
        ManifestValidation::Ok { tasks, stale } => {
            println!("ok ({tasks} tasks)");
            if stale {
                println!("manifest is stale; run `migrator plan` to pick up source changes");
            }
        }
    }
    if let Some(run_id) = outcome.interrupted_run {
        println!("run {run_id} did not finish");
    }
    Ok(exit_codes::OK)
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}
