//! Executor abstraction for running one invocation.
//!
//! The [`Executor`] trait decouples callers from process creation. The
//! process-backed [`TaskExecutor`] resolves the command line, merges the
//! environment, and supervises the child under the caller's context.

use std::io::Write;
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::core::command::resolve;
use crate::core::env::merge_env;
use crate::core::types::{EXIT_CODE_CANCELLED, ExecResult, InvocationSpec};
use crate::error::ExecError;
use crate::io::config::ExecutorConfig;
use crate::io::console::{ConsoleSink, StdConsole};
use crate::io::context::{ContextError, ExecContext};
use crate::io::process::{CommandOutput, Supervision, Tees, run_command_with_context};

/// Runs invocations to completion or cancellation.
pub trait Executor {
    /// Run `spec` once. Non-zero exit is reported through
    /// [`ExecResult::exit_code`], never as an error.
    fn execute(&self, ctx: &ExecContext, spec: InvocationSpec) -> Result<ExecResult, ExecError>;
}

/// Executor that spawns a real child process.
#[derive(Clone)]
pub struct TaskExecutor {
    config: ExecutorConfig,
    console: Arc<dyn ConsoleSink>,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            console: Arc::new(StdConsole),
        }
    }

    /// Send streamed output and command echo to `console` instead of the
    /// process's own stdout/stderr.
    pub fn with_console(mut self, console: Arc<dyn ConsoleSink>) -> Self {
        self.console = console;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

impl Executor for TaskExecutor {
    #[instrument(skip_all, fields(shell = spec.use_shell, streaming = spec.stream_output))]
    fn execute(&self, ctx: &ExecContext, spec: InvocationSpec) -> Result<ExecResult, ExecError> {
        if let Some(reason) = ctx.err() {
            debug!(%reason, "context done before start, not spawning");
            return Err(ExecError::ContextDone {
                reason,
                result: ExecResult::not_started(
                    reason == ContextError::Cancelled,
                    reason == ContextError::DeadlineExceeded,
                ),
            });
        }
        if spec.command.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let resolved = resolve(&spec, &self.config.shell, &self.config.shell_flag);
        if spec.echo_command {
            let mut out = self.console.stdout();
            if let Err(e) = writeln!(out, "exec: {resolved}").and_then(|()| out.flush()) {
                warn!(err = %e, "failed to echo command");
            }
        }

        let mut cmd = Command::new(&resolved.program);
        cmd.args(&resolved.args);
        if !spec.working_dir.as_os_str().is_empty() {
            cmd.current_dir(&spec.working_dir);
        }
        if !spec.env.is_empty() {
            cmd.env_clear();
            cmd.envs(merge_env(&spec.env, std::env::vars_os()));
        }

        let tees = if spec.stream_output {
            Tees {
                stdout: Some(self.console.stdout()),
                stderr: Some(self.console.stderr()),
            }
        } else {
            Tees::default()
        };
        let sup = Supervision {
            poll_interval: self.config.poll_interval(),
            output_limit_bytes: self.config.output_limit_bytes,
            kill_grace: self.config.kill_grace(),
        };

        debug!(program = %resolved.program, args = resolved.args.len(), "starting invocation");
        let output = run_command_with_context(cmd, spec.stdin, ctx, tees, sup)?;
        Ok(into_result(output))
    }
}

/// Run `spec` with a default [`TaskExecutor`].
pub fn execute(ctx: &ExecContext, spec: InvocationSpec) -> Result<ExecResult, ExecError> {
    TaskExecutor::default().execute(ctx, spec)
}

fn into_result(output: CommandOutput) -> ExecResult {
    // A failed wait leaves the exit code at zero; only an exit status counts.
    let exit_code = output
        .status
        .map_or(0, |status| status.code().unwrap_or(EXIT_CODE_CANCELLED));

    ExecResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
        cancelled: output.context_err == Some(ContextError::Cancelled),
        timed_out: output.context_err == Some(ContextError::DeadlineExceeded),
        stdout_truncated: output.stdout_truncated,
        stderr_truncated: output.stderr_truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CapturedConsole;

    struct FakeExecutor {
        exit_code: i32,
    }

    impl Executor for FakeExecutor {
        fn execute(
            &self,
            ctx: &ExecContext,
            spec: InvocationSpec,
        ) -> Result<ExecResult, ExecError> {
            if ctx.is_cancelled() {
                return Err(ExecError::ContextDone {
                    reason: ContextError::Cancelled,
                    result: ExecResult::not_started(true, false),
                });
            }
            Ok(ExecResult {
                stdout: spec.command,
                exit_code: self.exit_code,
                ..ExecResult::default()
            })
        }
    }

    fn run_all<E: Executor>(executor: &E, ctx: &ExecContext, commands: &[&str]) -> Vec<i32> {
        commands
            .iter()
            .map(|c| {
                executor
                    .execute(ctx, InvocationSpec::new(*c))
                    .map_or(EXIT_CODE_CANCELLED, |r| r.exit_code)
            })
            .collect()
    }

    #[test]
    fn executor_trait_is_usable_generically() {
        let ctx = ExecContext::background();
        let codes = run_all(&FakeExecutor { exit_code: 2 }, &ctx, &["a", "b"]);
        assert_eq!(codes, vec![2, 2]);

        ctx.cancel();
        let codes = run_all(&FakeExecutor { exit_code: 2 }, &ctx, &["a"]);
        assert_eq!(codes, vec![EXIT_CODE_CANCELLED]);
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = execute(&ExecContext::background(), InvocationSpec::new("  ")).unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }

    #[test]
    fn cancelled_context_refuses_before_validation() {
        let ctx = ExecContext::background();
        ctx.cancel();
        let err = execute(&ctx, InvocationSpec::new("")).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn echo_writes_resolved_command_to_console() {
        let console = CapturedConsole::new();
        let executor = TaskExecutor::default().with_console(Arc::new(console.clone()));
        let spec = InvocationSpec::new("true a  b").echo_command(true);

        let result = executor
            .execute(&ExecContext::background(), spec)
            .expect("execute");
        assert_eq!(result.exit_code, 0);
        assert_eq!(console.stdout_text(), "exec: true a b\n");
    }

    #[test]
    fn signal_killed_child_reports_sentinel_exit_code() {
        let spec = InvocationSpec::new("kill -KILL $$").shell(true);
        let result = execute(&ExecContext::background(), spec).expect("execute");
        assert_eq!(result.exit_code, EXIT_CODE_CANCELLED);
        assert!(!result.cancelled);
    }
}
