//! Signal-to-cancellation wiring.
//!
//! Kept in its own test binary: it delivers SIGINT to the test process and
//! relies on being the only signal guard installed.

#![cfg(unix)]

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use execute::{ExecContext, ExecError, InvocationSpec, Signal, SignalGuard, execute};

fn send_interrupt_to_self() {
    let status = Command::new("kill")
        .arg("-INT")
        .arg(std::process::id().to_string())
        .status()
        .expect("run kill");
    assert!(status.success());
}

fn wait_until_cancelled(ctx: &ExecContext) -> bool {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(5) {
        if ctx.is_cancelled() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// Walks the guard through its whole lifecycle in one process:
/// 1. A second install while one guard is live is refused.
/// 2. SIGINT cancels the guard's context but not the parent.
/// 3. After drop, a new guard can be installed, and a signal arriving while
///    a child runs kills it and marks the result cancelled.
#[test]
fn signal_guard_lifecycle() {
    let root = ExecContext::background();

    let guard = SignalGuard::install(&root, &[]).expect("install");
    let second = SignalGuard::install(&root, &[Signal::Interrupt]);
    assert!(matches!(second, Err(ExecError::SignalsAlreadyInstalled)));

    let ctx = guard.context();
    assert!(!ctx.is_cancelled());
    send_interrupt_to_self();
    assert!(wait_until_cancelled(&ctx), "context not cancelled by SIGINT");
    assert!(!root.is_cancelled());
    drop(guard);

    let guard =
        SignalGuard::install(&root, &[Signal::Interrupt, Signal::Terminate]).expect("reinstall");
    let ctx = guard.context();
    let sender = thread::spawn(|| {
        thread::sleep(Duration::from_millis(200));
        send_interrupt_to_self();
    });

    let result = execute(&ctx, InvocationSpec::new("sleep").arg("30")).expect("execute");
    sender.join().expect("join");
    assert!(result.cancelled);
    drop(guard);
}
