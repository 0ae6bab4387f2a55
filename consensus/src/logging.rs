//! Logging via the tracing crate.

use std::io;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt::format, prelude::*, EnvFilter};

/// Logging configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Output format for log.
    pub format: LoggingFormat,
    /// Filter directives used when `RUST_LOG` is not set, e.g. `"info,yac_consensus=debug"`.
    pub filter: Option<String>,
}

/// Logging output format.
///
/// Defaults to "text".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFormat {
    /// Text format.
    Text,
    /// JSON format.
    Json,
}

impl Default for LoggingFormat {
    fn default() -> Self {
        LoggingFormat::Text
    }
}

impl LoggingConfig {
    fn env_filter(&self) -> EnvFilter {
        match (&self.filter, std::env::var(EnvFilter::DEFAULT_ENV)) {
            (Some(directives), Err(_)) => EnvFilter::new(directives),
            _ => EnvFilter::from_default_env(),
        }
    }
}

/// Initializes the logging system with the default parameters.
///
/// See `init_with_config` for details.
pub fn init() -> anyhow::Result<()> {
    init_with_config(&Default::default())
}

/// Initializes the logging system.
///
/// This function should only be called once during the lifetime of the application. The installed
/// logger is global, so a second call returns an error.
pub fn init_with_config(config: &LoggingConfig) -> anyhow::Result<()> {
    let formatter = format::debug_fn(|writer, field, value| {
        if field.name() == "message" {
            write!(writer, "{:?}", value)
        } else {
            write!(writer, "{}={:?}", field, value)
        }
    })
    .delimited("; ");

    match config.format {
        // Setup a new tracing-subscriber writing to `stdout` for logging.
        LoggingFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(io::stdout)
                .with_env_filter(config.env_filter())
                .fmt_fields(formatter)
                .finish(),
        )?,
        // JSON logging writes to `stdout` as well but uses the JSON format.
        LoggingFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(io::stdout)
                .with_env_filter(config.env_filter())
                .json()
                .finish(),
        )?,
    }

    Ok(())
}
