//! Structured logging setup.

use std::fmt::Display;

use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Maps a `LOG_LEVEL` value to a tracing filter directive.
///
/// `fatal` has no tracing counterpart and maps to `error`.
pub fn level_directive(level: &str) -> Result<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "fatal" => Ok("error"),
        other => Err(Error::Logger(format!("unknown log level '{other}'"))),
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG`, when set, overrides `level`. `format` is `text` or `json`.
pub fn init(level: &str, format: &str) -> Result<()> {
    let directive = level_directive(level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Logger(e.to_string()))
}

/// Logs `err` at error level tagged as fatal and exits with status 1.
pub fn fatal(err: impl Display) -> ! {
    error!(fatal = true, error = %err, "fatal error, exiting");
    std::process::exit(1)
}
