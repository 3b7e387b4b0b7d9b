//! Deterministic, pure logic shared by the migrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod dataset;
pub mod extract;
pub mod gate;
pub mod graph;
pub mod invariants;
pub mod lifecycle;
pub mod manifest;
pub mod naming;
pub mod refine;
pub mod schedule;
pub mod types;
