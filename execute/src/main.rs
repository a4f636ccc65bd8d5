//! Run one command under signal-driven cancellation.
//!
//! Thin caller over the `execute` library: builds an [`InvocationSpec`] from
//! flags, runs it once, and exits with the child's status.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use execute::io::config::{DEBUG_ENV, load_config};
use execute::{
    ExecContext, ExecError, ExecResult, Executor, InvocationSpec, Signal, SignalGuard,
    TaskExecutor, exit_codes, logging,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "execute", version, about = "Run a command and report its result")]
struct Cli {
    /// Run through the configured shell instead of spawning directly.
    #[arg(long)]
    shell: bool,

    /// Environment override (`KEY=VALUE`); repeatable.
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Working directory for the command.
    #[arg(short = 'C', long = "cwd")]
    cwd: Option<PathBuf>,

    /// Mirror output live instead of printing it after exit.
    #[arg(long)]
    stream: bool,

    /// Print the resolved command before running it.
    #[arg(long)]
    print_command: bool,

    /// File to attach as the command's stdin.
    #[arg(long)]
    stdin_file: Option<PathBuf>,

    /// Kill the command after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// TOML configuration file.
    #[arg(long, default_value = "execute.toml")]
    config: PathBuf,

    /// Command to run, optionally followed by its arguments.
    command: String,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    config.apply_env(std::env::var(DEBUG_ENV).ok().map(|v| (DEBUG_ENV, v)));
    logging::init(&config.log);

    let mut spec = InvocationSpec::new(cli.command)
        .args(cli.args)
        .shell(cli.shell)
        .stream_output(cli.stream)
        .echo_command(cli.print_command);
    spec.env = cli.env;
    if let Some(cwd) = cli.cwd {
        spec = spec.working_dir(cwd);
    }
    if let Some(path) = cli.stdin_file {
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        spec = spec.stdin_file(file);
    }

    let guard = SignalGuard::install(&ExecContext::background(), &signals())
        .context("install signal handler")?;
    let ctx = match cli.timeout_secs {
        Some(secs) => guard.context().with_timeout(Duration::from_secs(secs)),
        None => guard.context(),
    };

    let executor = TaskExecutor::new(config.executor);
    let streamed = spec.stream_output;
    let result = match executor.execute(&ctx, spec) {
        Ok(result) => result,
        Err(ExecError::ContextDone { result, .. }) => result,
        Err(e) => return Err(e).context("run command"),
    };
    drop(guard);

    if !streamed {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
    }
    Ok(exit_code(&result))
}

fn signals() -> Vec<Signal> {
    #[cfg(unix)]
    {
        vec![Signal::Interrupt, Signal::Terminate]
    }
    #[cfg(not(unix))]
    {
        vec![Signal::Interrupt]
    }
}

fn exit_code(result: &ExecResult) -> i32 {
    if result.cancelled {
        debug!("command cancelled");
        return exit_codes::CANCELLED;
    }
    if result.timed_out {
        debug!("command timed out");
        return exit_codes::TIMED_OUT;
    }
    match result.exit_code {
        0 => exit_codes::OK,
        code if code < 0 => {
            debug!(code, "child killed by a signal");
            exit_codes::INVALID
        }
        code => code,
    }
}
