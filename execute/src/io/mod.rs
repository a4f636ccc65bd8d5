//! Side-effecting adapters: process supervision, cancellation, signals, config.

pub mod config;
pub mod console;
pub mod context;
pub mod executor;
pub mod process;
pub mod signals;
