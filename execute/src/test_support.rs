//! Test-only helpers for driving the executor.

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::core::types::InvocationSpec;
use crate::io::console::ConsoleSink;

/// Console that records streamed output in memory.
#[derive(Debug, Clone, Default)]
pub struct CapturedConsole {
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
}

impl CapturedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout_text(&self) -> String {
        read_shared(&self.stdout)
    }

    pub fn stderr_text(&self) -> String {
        read_shared(&self.stderr)
    }
}

impl ConsoleSink for CapturedConsole {
    fn stdout(&self) -> Box<dyn Write + Send> {
        Box::new(SharedWriter(self.stdout.clone()))
    }

    fn stderr(&self) -> Box<dyn Write + Send> {
        Box::new(SharedWriter(self.stderr.clone()))
    }
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .0
            .lock()
            .map_err(|_| io::Error::other("captured console poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn read_shared(buf: &Mutex<Vec<u8>>) -> String {
    let bytes = buf.lock().map(|b| b.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Shell-mode spec for a script.
pub fn sh(script: &str) -> InvocationSpec {
    InvocationSpec::new(script).shell(true)
}

/// Direct-mode spec that creates `marker` when it runs.
pub fn touch_spec(marker: &Path) -> InvocationSpec {
    InvocationSpec::new("touch").arg(marker.display().to_string())
}

/// Create a temporary directory for a test.
pub fn scratch_dir() -> io::Result<tempfile::TempDir> {
    tempfile::tempdir()
}
