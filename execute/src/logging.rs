//! Diagnostic tracing for the executor and its binary.
//!
//! Library code only emits `tracing` events; nothing is printed unless the
//! embedding program installs a subscriber, for example with [`init`].

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::io::config::LogConfig;

/// Level used when `RUST_LOG` is unset.
pub fn default_directive(config: &LogConfig) -> &'static str {
    if config.debug { "debug" } else { "warn" }
}

/// Initialize a tracing subscriber writing compact lines to stderr.
///
/// Reads `RUST_LOG` when set; otherwise uses [`default_directive`]. Returns
/// `false` when a global subscriber was already installed.
///
/// # Example
/// ```bash
/// RUST_LOG=execute=debug execute --shell 'echo hi'
/// ```
pub fn init(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_selects_directive() {
        assert_eq!(default_directive(&LogConfig { debug: true }), "debug");
        assert_eq!(default_directive(&LogConfig::default()), "warn");
    }
}
