//! Dependency-aware migration pipeline for legacy statistical script trees.
//!
//! The crate turns a directory of interdependent source units into validated
//! target-language artifacts. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (graph, schedule, manifest, gate,
//!   refinement loop). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, subprocesses, oracle and
//!   harness adapters, snapshots, traces). Isolated behind traits for tests.
//!
//! Orchestration modules ([`plan`], [`stages`], [`preflight`], [`step`],
//! [`run`], [`emit`], [`validate`]) coordinate core logic with I/O to implement
//! CLI commands.

pub mod core;
pub mod emit;
pub mod errors;
pub mod exit_codes;
pub mod io;
pub mod latch;
pub mod logging;
pub mod plan;
pub mod preflight;
pub mod report;
pub mod run;
pub mod stages;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
