//! Console destinations for streamed output and command echo.

use std::io::{self, Write};

/// Supplies writers for the parent's console streams.
///
/// Each call returns a fresh handle; the executor takes one per stream per
/// invocation and writes to it from a reader thread.
pub trait ConsoleSink: Send + Sync {
    fn stdout(&self) -> Box<dyn Write + Send>;
    fn stderr(&self) -> Box<dyn Write + Send>;
}

/// The process's real stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdConsole;

impl ConsoleSink for StdConsole {
    fn stdout(&self) -> Box<dyn Write + Send> {
        Box::new(io::stdout())
    }

    fn stderr(&self) -> Box<dyn Write + Send> {
        Box::new(io::stderr())
    }
}
