//! Invocation and result value types.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Exit code reported when the process never started or was killed.
pub const EXIT_CODE_CANCELLED: i32 = -1;

/// Source attached to the child's standard input.
pub enum StdinSource {
    /// Bytes written to a pipe, after which the pipe is closed.
    Bytes(Vec<u8>),
    /// File handed to the child directly as its stdin.
    File(File),
    /// Arbitrary reader pumped into a pipe by a helper thread.
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for StdinSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Description of one external program invocation.
///
/// `command` may carry its own space-separated arguments when `args` is empty
/// and `use_shell` is false; see [`crate::core::command::resolve`] for the
/// exact rules.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationSpec {
    /// Executable path, or executable followed by space-separated arguments.
    pub command: String,
    /// Additional arguments.
    pub args: Vec<String>,
    /// Run through the configured shell (`<shell> -c "<script>"`).
    pub use_shell: bool,
    /// `KEY=VALUE` overrides applied on top of the inherited environment.
    pub env: Vec<String>,
    /// Working directory for the child; empty inherits the caller's.
    pub working_dir: PathBuf,
    #[serde(skip)]
    pub stdin: Option<StdinSource>,
    /// Mirror stdout/stderr to the console while still capturing them.
    pub stream_output: bool,
    /// Print the resolved command line before starting.
    pub echo_command: bool,
}

impl InvocationSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a `KEY=VALUE` override.
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }

    pub fn shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn stdin_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(StdinSource::Bytes(bytes.into()));
        self
    }

    pub fn stdin_file(mut self, file: File) -> Self {
        self.stdin = Some(StdinSource::File(file));
        self
    }

    pub fn stdin_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.stdin = Some(StdinSource::Reader(Box::new(reader)));
        self
    }

    pub fn stream_output(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    pub fn echo_command(mut self, echo: bool) -> Self {
        self.echo_command = echo;
        self
    }
}

/// Outcome of one invocation.
///
/// Check `cancelled` and `timed_out` before interpreting `exit_code`: when
/// either is set the exit code carries no defined meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit status, or [`EXIT_CODE_CANCELLED`] when the process never
    /// started or was terminated by a signal.
    pub exit_code: i32,
    /// The execution context was cancelled.
    pub cancelled: bool,
    /// The execution context's deadline expired.
    pub timed_out: bool,
    /// Bytes of stdout dropped by the configured output limit.
    pub stdout_truncated: usize,
    /// Bytes of stderr dropped by the configured output limit.
    pub stderr_truncated: usize,
}

impl ExecResult {
    /// Result for an invocation that was never started.
    pub fn not_started(cancelled: bool, timed_out: bool) -> Self {
        Self {
            exit_code: EXIT_CODE_CANCELLED,
            cancelled,
            timed_out,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.cancelled && !self.timed_out && self.exit_code == 0
    }
}

/// Executable and argument list derived from an [`InvocationSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
