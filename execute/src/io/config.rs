//! Executor configuration loaded from TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Environment variable that turns on debug logging when set to `1`.
pub const DEBUG_ENV: &str = "EXECUTE_DEBUG";

/// Top-level configuration file.
///
/// Missing fields default to the values used by the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Shell used when an invocation sets `use_shell`.
    pub shell: String,

    /// Flag that makes `shell` run its next argument as a script.
    pub shell_flag: String,

    /// Upper bound between cancellation checks while a child runs.
    pub poll_interval_ms: u64,

    /// Bytes of stdout/stderr kept in memory per stream. Unbounded when unset.
    pub output_limit_bytes: Option<usize>,

    /// How long to keep reading output after the child is killed. Processes it
    /// forked may still hold the pipes; whatever arrived by then is returned.
    pub kill_grace_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            shell_flag: "-c".to_string(),
            poll_interval_ms: 50,
            output_limit_bytes: None,
            kill_grace_ms: 500,
        }
    }
}

impl ExecutorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(anyhow!("executor.shell must not be empty"));
        }
        if self.shell_flag.trim().is_empty() {
            return Err(anyhow!("executor.shell_flag must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("executor.poll_interval_ms must be > 0"));
        }
        if self.output_limit_bytes == Some(0) {
            return Err(anyhow!("executor.output_limit_bytes must be > 0 when set"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Emit debug-level diagnostics when `RUST_LOG` is unset.
    pub debug: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.executor.validate()
    }

    /// Apply environment-provided settings. Takes the variables explicitly so
    /// the decision is made once, at startup.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if key.as_ref() == DEBUG_ENV && value.as_ref() == "1" {
                self.log.debug = true;
            }
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
