//! Stable exit codes for migrator CLI commands.

/// Command succeeded; `run` reached every task's final status.
pub const OK: i32 = 0;
/// Command failed due to invalid layout/config/manifest or other errors.
pub const INVALID: i32 = 1;
/// `migrator run` finished with failed or unrefined tasks.
pub const PARTIAL: i32 = 2;
/// `migrator run` stopped on a critical structural failure.
pub const HALTED: i32 = 3;
