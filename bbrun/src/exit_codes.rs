//! Stable exit codes for the `bbrun` CLI.

/// Every step of the pipeline succeeded (or `--list` printed the names).
pub const OK: i32 = 0;
/// Invalid definition, config or arguments; no step was run.
pub const INVALID: i32 = 1;
/// At least one step failed.
pub const FAILED: i32 = 2;
