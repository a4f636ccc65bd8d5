//! Supervise one child process under an [`ExecContext`], capturing its output.

use std::io::{self, Read, Write};
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::StdinSource;
use crate::error::ExecError;
use crate::io::context::{ContextError, ExecContext};

const READ_CHUNK_BYTES: usize = 8192;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// `None` when waiting on the child failed.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    /// State of the context when the wait returned.
    pub context_err: Option<ContextError>,
    /// The child was killed because the context was done.
    pub killed: bool,
}

/// Optional live mirrors for the captured streams.
#[derive(Default)]
pub struct Tees {
    pub stdout: Option<Box<dyn Write + Send>>,
    pub stderr: Option<Box<dyn Write + Send>>,
}

/// Limits applied while supervising a child.
#[derive(Debug, Clone, Copy)]
pub struct Supervision {
    /// Upper bound between cancellation checks.
    pub poll_interval: Duration,
    /// Bytes kept in memory per stream; `None` keeps everything.
    pub output_limit_bytes: Option<usize>,
    /// How long to keep draining output once the context is done. Processes
    /// forked by the child can hold the pipes open after it is killed.
    pub kill_grace: Duration,
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

type SharedCapture = Arc<Mutex<Captured>>;

/// One output pipe being drained on its own thread.
struct StreamReader {
    captured: SharedCapture,
    handle: thread::JoinHandle<Result<(), ExecError>>,
}

/// Spawn `cmd` and wait for it, killing it if `ctx` becomes done first.
///
/// stdout and stderr are read concurrently on dedicated threads so a chatty
/// child never blocks on a full pipe. When a tee is supplied for a stream,
/// each chunk is written to it as soon as it is read, in order. Once the
/// context is done, output is drained for at most `sup.kill_grace` before
/// whatever was captured is returned.
#[instrument(skip_all, fields(program = %cmd.get_program().to_string_lossy(), poll_ms = sup.poll_interval.as_millis() as u64))]
pub fn run_command_with_context(
    mut cmd: Command,
    stdin: Option<StdinSource>,
    ctx: &ExecContext,
    tees: Tees,
    sup: Supervision,
) -> Result<CommandOutput, ExecError> {
    let pump = match stdin {
        None => {
            cmd.stdin(Stdio::null());
            None
        }
        Some(StdinSource::File(file)) => {
            cmd.stdin(Stdio::from(file));
            None
        }
        Some(source) => {
            cmd.stdin(Stdio::piped());
            Some(source)
        }
    };
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(ExecError::Spawn {
                program: cmd.get_program().to_string_lossy().into_owned(),
                source: e,
            });
        }
    };

    let stdin_handle = match pump {
        Some(source) => {
            let child_stdin = child.stdin.take().ok_or(ExecError::Pipe("stdin"))?;
            pump_stdin(source, child_stdin)
        }
        None => None,
    };

    let stdout = child.stdout.take().ok_or(ExecError::Pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(ExecError::Pipe("stderr"))?;

    let Tees {
        stdout: stdout_tee,
        stderr: stderr_tee,
    } = tees;
    let detached = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = mpsc::channel();
    let stdout_reader = spawn_reader(
        stdout,
        "stdout",
        sup.output_limit_bytes,
        stdout_tee,
        &detached,
        done_tx.clone(),
    );
    let stderr_reader = spawn_reader(
        stderr,
        "stderr",
        sup.output_limit_bytes,
        stderr_tee,
        &detached,
        done_tx,
    );

    let mut killed = false;
    let status = loop {
        match child.wait_timeout(next_poll(ctx, sup.poll_interval)) {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                debug!(err = %e, "wait for child failed");
                if let Err(e) = child.kill() {
                    debug!(err = %e, "kill after failed wait");
                }
                break None;
            }
        }

        if let Some(reason) = ctx.err() {
            warn!(%reason, "context done, killing child");
            killed = true;
            if let Err(e) = child.kill() {
                debug!(err = %e, "kill child");
            }
            break match child.wait() {
                Ok(status) => Some(status),
                Err(e) => {
                    debug!(err = %e, "wait after kill failed");
                    None
                }
            };
        }
    };
    let context_err = ctx.err();

    let drained = await_readers(&done_rx, ctx, killed, sup);
    if !drained {
        warn!(
            grace_ms = sup.kill_grace.as_millis() as u64,
            "output still open after kill, returning partial capture"
        );
        detached.store(true, Ordering::SeqCst);
    }
    let (stdout, stdout_truncated) = finish_reader(stdout_reader, drained)?;
    let (stderr, stderr_truncated) = finish_reader(stderr_reader, drained)?;

    if let Some(handle) = stdin_handle {
        if killed || !drained {
            debug!("child killed, not waiting for stdin writer");
        } else {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("child closed stdin before reading all input");
                }
                Ok(Err(e)) => debug!(err = %e, "stdin write failed"),
                Err(_) => debug!("stdin writer thread panicked"),
            }
        }
    }

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.and_then(|s| s.code()), killed, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        context_err,
        killed,
    })
}

fn next_poll(ctx: &ExecContext, poll_interval: Duration) -> Duration {
    match ctx.remaining() {
        Some(remaining) => remaining.min(poll_interval),
        None => poll_interval,
    }
}

/// Wait until both readers report end of stream.
///
/// Returns `false` when the grace period, started by a kill or by the
/// context finishing while output is still open, runs out first.
fn await_readers(
    done_rx: &mpsc::Receiver<&'static str>,
    ctx: &ExecContext,
    killed: bool,
    sup: Supervision,
) -> bool {
    let mut pending = 2;
    let mut drain_until = killed.then(|| Instant::now() + sup.kill_grace);

    while pending > 0 {
        if drain_until.is_none() && ctx.err().is_some() {
            drain_until = Some(Instant::now() + sup.kill_grace);
        }
        let wait = match drain_until {
            Some(until) => until
                .saturating_duration_since(Instant::now())
                .min(sup.poll_interval),
            None => sup.poll_interval,
        };

        match done_rx.recv_timeout(wait) {
            Ok(stream) => {
                debug!(stream, "output closed");
                pending -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if drain_until.is_some_and(|until| Instant::now() >= until) {
                    return false;
                }
            }
            // every reader has exited; a panic surfaces on join
            Err(RecvTimeoutError::Disconnected) => return true,
        }
    }
    true
}

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    stream: &'static str,
    limit: Option<usize>,
    tee: Option<Box<dyn Write + Send>>,
    detached: &Arc<AtomicBool>,
    done: mpsc::Sender<&'static str>,
) -> StreamReader {
    let captured = SharedCapture::default();
    let sink = captured.clone();
    let detached = detached.clone();
    let handle = thread::spawn(move || {
        let result = read_stream_tee(reader, stream, limit, tee, &sink, &detached);
        let _ = done.send(stream);
        result
    });
    StreamReader { captured, handle }
}

/// Collect a reader's capture. A reader that is still running is left
/// detached and only what it has read so far is returned.
fn finish_reader(reader: StreamReader, drained: bool) -> Result<(Vec<u8>, usize), ExecError> {
    if drained {
        match reader.handle.join() {
            Ok(result) => result?,
            Err(_) => return Err(ExecError::ReaderPanicked),
        }
    }
    let mut captured = reader
        .captured
        .lock()
        .map_err(|_| ExecError::ReaderPanicked)?;
    let Captured { bytes, truncated } = std::mem::take(&mut *captured);
    Ok((bytes, truncated))
}

/// Feed `source` into the child's stdin on a helper thread.
///
/// Only in-memory input is joined: a reader source may block indefinitely on
/// its own input, so its thread is detached and failures are only logged.
fn pump_stdin(
    source: StdinSource,
    mut child_stdin: ChildStdin,
) -> Option<thread::JoinHandle<io::Result<()>>> {
    match source {
        StdinSource::Bytes(bytes) => Some(thread::spawn(move || {
            child_stdin.write_all(&bytes)
            // dropping child_stdin closes the pipe
        })),
        StdinSource::Reader(mut reader) => {
            thread::spawn(move || {
                if let Err(e) = io::copy(&mut reader, &mut child_stdin) {
                    debug!(err = %e, "copy stdin reader into child");
                }
            });
            None
        }
        StdinSource::File(_) => None,
    }
}

/// Drain `reader` into `captured`, keeping up to `limit` bytes and mirroring
/// every chunk to `tee`.
///
/// A failing tee is dropped after the first error; capture continues. Once
/// `detached` is set, nothing further is recorded or mirrored.
fn read_stream_tee<R: Read>(
    mut reader: R,
    stream: &'static str,
    limit: Option<usize>,
    mut tee: Option<Box<dyn Write + Send>>,
    captured: &Mutex<Captured>,
    detached: &AtomicBool,
) -> Result<(), ExecError> {
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(ExecError::Output { stream, source }),
        };
        if detached.load(Ordering::SeqCst) {
            break;
        }

        if let Some(writer) = tee.as_mut()
            && let Err(e) = writer.write_all(&chunk[..n]).and_then(|()| writer.flush())
        {
            warn!(stream, err = %e, "failed to mirror output, disabling mirror");
            tee = None;
        }

        let mut buf = captured.lock().map_err(|_| ExecError::ReaderPanicked)?;
        let keep = match limit {
            Some(limit) => n.min(limit.saturating_sub(buf.bytes.len())),
            None => n,
        };
        buf.bytes.extend_from_slice(&chunk[..keep]);
        buf.truncated += n - keep;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("console gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn drain(
        data: &[u8],
        limit: Option<usize>,
        tee: Option<Box<dyn Write + Send>>,
    ) -> Captured {
        let captured = Mutex::new(Captured::default());
        read_stream_tee(data, "stdout", limit, tee, &captured, &AtomicBool::new(false))
            .expect("read");
        captured.into_inner().expect("lock")
    }

    fn sup(kill_grace: Duration) -> Supervision {
        Supervision {
            poll_interval: Duration::from_millis(10),
            output_limit_bytes: None,
            kill_grace,
        }
    }

    #[test]
    fn read_stream_tee_mirrors_every_byte() {
        let data = vec![b'x'; READ_CHUNK_BYTES * 3 + 17];
        let mirror = Shared::default();
        let captured = drain(&data, None, Some(Box::new(mirror.clone())));
        assert_eq!(captured.bytes, data);
        assert_eq!(captured.truncated, 0);
        assert_eq!(*mirror.0.lock().expect("lock"), data);
    }

    #[test]
    fn read_stream_tee_counts_bytes_past_limit() {
        let mirror = Shared::default();
        let captured = drain(b"0123456789", Some(4), Some(Box::new(mirror.clone())));
        assert_eq!(captured.bytes, b"0123");
        assert_eq!(captured.truncated, 6);
        assert_eq!(*mirror.0.lock().expect("lock"), b"0123456789");
    }

    #[test]
    fn failing_tee_does_not_affect_capture() {
        let captured = drain(b"hello", None, Some(Box::new(Broken)));
        assert_eq!(captured.bytes, b"hello");
    }

    #[test]
    fn detached_reader_records_nothing_more() {
        let captured = Mutex::new(Captured::default());
        let mirror = Shared::default();
        read_stream_tee(
            &b"late"[..],
            "stdout",
            None,
            Some(Box::new(mirror.clone())),
            &captured,
            &AtomicBool::new(true),
        )
        .expect("read");
        assert!(captured.lock().expect("lock").bytes.is_empty());
        assert!(mirror.0.lock().expect("lock").is_empty());
    }

    #[test]
    fn next_poll_never_passes_deadline() {
        let ctx = ExecContext::background().with_timeout(Duration::from_millis(5));
        assert!(next_poll(&ctx, Duration::from_secs(10)) <= Duration::from_millis(5));
        let open = ExecContext::background();
        assert_eq!(
            next_poll(&open, Duration::from_millis(50)),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn await_readers_gives_up_after_grace_when_killed() {
        let (_done_tx, done_rx) = mpsc::channel();
        let started = Instant::now();
        let drained = await_readers(
            &done_rx,
            &ExecContext::background(),
            true,
            sup(Duration::from_millis(50)),
        );
        assert!(!drained);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn await_readers_starts_grace_when_context_finishes_later() {
        let (_done_tx, done_rx) = mpsc::channel();
        let ctx = ExecContext::background();
        ctx.cancel();
        let drained = await_readers(&done_rx, &ctx, false, sup(Duration::ZERO));
        assert!(!drained);
    }

    #[test]
    fn await_readers_returns_once_both_streams_close() {
        let (done_tx, done_rx) = mpsc::channel();
        done_tx.send("stdout").expect("send");
        done_tx.send("stderr").expect("send");
        let drained = await_readers(
            &done_rx,
            &ExecContext::background(),
            true,
            sup(Duration::from_secs(60)),
        );
        assert!(drained);
    }
}
