//! Deterministic, pure logic for building a child process invocation.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod command;
pub mod env;
pub mod types;
