//! Stable exit codes for `coder` CLI commands.

/// The goal finished with DONE, or a non-run command succeeded.
pub const OK: i32 = 0;
/// Invalid config, unreachable backend, host failure, or an exhausted step budget.
pub const FAILED: i32 = 1;
