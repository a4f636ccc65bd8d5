//! Stable exit codes for the `execute` binary.

/// The child exited with status 0.
pub const OK: i32 = 0;
/// Invalid configuration, spawn failure, or another executor error. Also used
/// when the child was terminated by a signal and has no exit status.
pub const INVALID: i32 = 1;
/// The context deadline expired before the child finished.
pub const TIMED_OUT: i32 = 124;
/// The invocation was cancelled, usually by an interrupt signal.
pub const CANCELLED: i32 = 130;
