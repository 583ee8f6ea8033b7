//! Stable exit codes for `explorer` CLI commands.

/// Command succeeded, or the exploration task completed.
pub const OK: i32 = 0;
/// Command failed due to invalid config, filesystem errors, or bad arguments.
pub const INVALID: i32 = 1;
/// `explorer explore` ran `max_rounds` rounds without completing the task.
pub const MAX_ROUNDS: i32 = 2;
/// `explorer explore` aborted on a fatal device, reasoning, or reply error.
pub const ABORTED: i32 = 3;
