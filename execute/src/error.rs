//! Errors surfaced by the executor.

use std::io;

use thiserror::Error;

use crate::core::types::ExecResult;
use crate::io::context::ContextError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("command must not be empty")]
    EmptyCommand,

    /// The context was already done when the invocation was requested. No
    /// process was started; `result` carries the sentinel exit code.
    #[error("execution context {reason} before start")]
    ContextDone {
        reason: ContextError,
        result: ExecResult,
    },

    #[error("spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} was not piped")]
    Pipe(&'static str),

    #[error("read {stream}")]
    Output {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("output reader thread panicked")]
    ReaderPanicked,

    #[error("signal handler already installed for this process")]
    SignalsAlreadyInstalled,

    #[error("install signal handler")]
    Signal(#[source] io::Error),
}

impl ExecError {
    /// True when the invocation was refused because the context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::ContextDone {
                reason: ContextError::Cancelled,
                ..
            }
        )
    }

    /// The result attached to a pre-flight refusal, if any.
    pub fn result(&self) -> Option<&ExecResult> {
        match self {
            Self::ContextDone { result, .. } => Some(result),
            _ => None,
        }
    }
}
