//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing` with an `event = "..."`
//! field; binaries call [`init_logging`] once at startup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug`, `sticky_core=trace`)
pub const LOG_ENV: &str = "STICKY_LOG";

/// Install a stderr `fmt` subscriber. Returns false if one was already set.
pub fn init_logging(verbose: bool) -> bool {
    let level = if verbose {
        "debug".to_string()
    } else if let Ok(level) = std::env::var(LOG_ENV) {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
