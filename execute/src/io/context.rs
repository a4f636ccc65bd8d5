//! Cooperative cancellation and deadlines for invocations.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// A cloneable execution context carrying a cancel signal and an optional
/// deadline.
///
/// Clones share cancellation: cancelling one cancels all of them. A context
/// derived with [`child`](Self::child) (or the `with_*` constructors) is
/// cancelled whenever its parent is, but cancelling it leaves the parent
/// untouched.
#[derive(Debug, Clone)]
pub struct ExecContext {
    // Ancestors first, own token last.
    tokens: Vec<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::background()
    }
}

impl ExecContext {
    /// A root context that is never done until cancelled.
    pub fn background() -> Self {
        Self {
            tokens: vec![Arc::new(AtomicBool::new(false))],
            deadline: None,
        }
    }

    pub fn child(&self) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(Arc::new(AtomicBool::new(false)));
        Self {
            tokens,
            deadline: self.deadline,
        }
    }

    /// Derive a child whose deadline is `timeout` from now, or the parent's
    /// deadline if that is earlier.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        child
    }

    pub fn cancel(&self) {
        if let Some(own) = self.tokens.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.tokens.iter().any(|t| t.load(Ordering::SeqCst))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Some` once the context is done. Cancellation takes precedence over
    /// an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }
}
