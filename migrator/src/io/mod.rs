//! I/O adapters for migrator commands.

pub mod config;
pub mod fsutil;
pub mod harness;
pub mod init;
pub mod manifest_store;
pub mod oracle;
pub mod process;
pub mod prompt;
pub mod run_state;
pub mod snapshot;
pub mod sources;
pub mod trace;
pub mod working_state;
