//! Run one external program under a cancellable context and report what it did.
//!
//! An [`InvocationSpec`] describes the command, its arguments, shell mode,
//! environment overrides, working directory, stdin and streaming preferences.
//! An [`Executor`] runs it to completion or cancellation and yields an
//! [`ExecResult`] with captured stdout/stderr, the exit code, and whether the
//! context was cancelled or timed out.
//!
//! - **[`core`]**: Pure logic (command resolution, environment merge, types).
//! - **[`io`]**: Process supervision, cancellation contexts, signal wiring,
//!   console sinks and configuration.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::types::{
    EXIT_CODE_CANCELLED, ExecResult, InvocationSpec, ResolvedCommand, StdinSource,
};
pub use crate::error::ExecError;
pub use crate::io::context::{ContextError, ExecContext};
pub use crate::io::executor::{Executor, TaskExecutor, execute};
pub use crate::io::signals::{Signal, SignalGuard};
