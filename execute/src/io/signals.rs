//! Turn OS termination signals into context cancellation.
//!
//! One [`SignalGuard`] may be live per process. It owns a background thread
//! running a current-thread tokio runtime that waits for the first signal and
//! then cancels the guard's context. Dropping the guard stops the listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::ExecError;
use crate::io::context::ExecContext;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Signals that cancel the guarded context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    #[cfg(unix)]
    Terminate,
    #[cfg(unix)]
    Hangup,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            #[cfg(unix)]
            Self::Terminate => "terminate",
            #[cfg(unix)]
            Self::Hangup => "hangup",
        }
    }
}

/// Scoped signal subscription. See the module docs.
#[derive(Debug)]
pub struct SignalGuard {
    ctx: ExecContext,
    stop: Option<oneshot::Sender<()>>,
    listener: Option<thread::JoinHandle<()>>,
}

impl SignalGuard {
    /// Subscribe to `signals` (interrupt when empty) and derive a context
    /// from `parent` that is cancelled on the first one received.
    pub fn install(parent: &ExecContext, signals: &[Signal]) -> Result<Self, ExecError> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(ExecError::SignalsAlreadyInstalled);
        }
        match Self::start(parent, signals) {
            Ok(guard) => Ok(guard),
            Err(e) => {
                INSTALLED.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// The context cancelled by signal delivery.
    pub fn context(&self) -> ExecContext {
        self.ctx.clone()
    }

    fn start(parent: &ExecContext, signals: &[Signal]) -> Result<Self, ExecError> {
        let signals = if signals.is_empty() {
            &[Signal::Interrupt][..]
        } else {
            signals
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(ExecError::Signal)?;

        // Register before returning so no signal is missed once install succeeds.
        let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
        {
            let _enter = runtime.enter();
            for &signal in signals {
                subscribe(&runtime, signal, fired_tx.clone())?;
            }
        }
        drop(fired_tx);

        let ctx = parent.child();
        let target = ctx.clone();
        let (stop_tx, stop_rx) = oneshot::channel();

        let listener = thread::Builder::new()
            .name("signal-listener".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    tokio::select! {
                        Some(signal) = fired_rx.recv() => {
                            info!(signal = signal.name(), "received signal, cancelling");
                            target.cancel();
                        }
                        _ = stop_rx => debug!("signal listener stopped"),
                    }
                });
            })
            .map_err(ExecError::Signal)?;

        debug!(count = signals.len(), "signal listener installed");
        Ok(Self {
            ctx,
            stop: Some(stop_tx),
            listener: Some(listener),
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Err means the listener already fired and exited.
            let _ = stop.send(());
        }
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
        INSTALLED.store(false, Ordering::SeqCst);
    }
}

#[cfg(unix)]
fn subscribe(
    runtime: &Runtime,
    signal: Signal,
    fired: mpsc::UnboundedSender<Signal>,
) -> Result<(), ExecError> {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    let kind = match signal {
        Signal::Interrupt => SignalKind::interrupt(),
        Signal::Terminate => SignalKind::terminate(),
        Signal::Hangup => SignalKind::hangup(),
    };
    let mut stream = unix_signal(kind).map_err(ExecError::Signal)?;
    runtime.spawn(async move {
        if stream.recv().await.is_some() {
            let _ = fired.send(signal);
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn subscribe(
    runtime: &Runtime,
    signal: Signal,
    fired: mpsc::UnboundedSender<Signal>,
) -> Result<(), ExecError> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c().map_err(ExecError::Signal)?;
    runtime.spawn(async move {
        if ctrl_c.recv().await.is_some() {
            let _ = fired.send(signal);
        }
    });
    Ok(())
}
