//! Stable exit codes for weaver CLI commands.

/// Session ended on its deadline or by user cancellation; other commands succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, catalog or environment, or any other error.
pub const INVALID: i32 = 1;
/// The editor could not be reached through any launch strategy.
pub const STARTUP_FAILED: i32 = 2;
/// The session aborted after too many consecutive failures.
pub const ABORTED: i32 = 3;
