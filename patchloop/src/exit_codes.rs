//! Stable exit codes for patchloop CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input files, config or arguments.
pub const INVALID: i32 = 1;
/// `patchloop run` ended with a planner or developer error.
pub const RUN_FAILED: i32 = 2;
