//! Logging and observability
//!
//! Structured logging with the `tracing` crate. Two output modes exist
//! because the binary runs in two roles:
//!
//! - **Consumer**: everything goes to stderr, keeping stdout free for the
//!   single machine-readable result of sync actions like `test-connection`.
//! - **Producer**: informational events go to stdout and warnings/errors to
//!   stderr. The supervising consumer reads the two descriptors as separate
//!   log channels and forwards them at info and warning level respectively.

use crate::domain::{Result, StrataError};
use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Which role the current process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// CLI consumer: all log output on stderr
    Consumer,
    /// Producer child: info on stdout, warnings and errors on stderr
    Producer,
}

/// Initialize the logging system
///
/// # Errors
///
/// Returns a configuration error for an unknown level string or if a global
/// subscriber is already installed.
pub fn init_logging(log_level_str: &str, mode: LogMode) -> Result<()> {
    let log_level = parse_log_level(log_level_str)?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strata={log_level}")));

    match mode {
        LogMode::Consumer => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(env_filter);

            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| {
                    StrataError::Configuration(format!("Failed to initialize logging: {e}"))
                })?;
        }
        LogMode::Producer => {
            // Plain messages without timestamps or levels: the consumer
            // re-logs every line with its own formatting.
            let info_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(false)
                .without_time()
                .with_writer(std::io::stdout)
                .with_filter(filter_fn(|metadata| *metadata.level() >= Level::INFO));

            let warn_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(false)
                .without_time()
                .with_writer(std::io::stderr)
                .with_filter(filter_fn(|metadata| *metadata.level() <= Level::WARN));

            tracing_subscriber::registry()
                .with(env_filter)
                .with(info_layer)
                .with(warn_layer)
                .try_init()
                .map_err(|e| {
                    StrataError::Configuration(format!("Failed to initialize logging: {e}"))
                })?;
        }
    }

    Ok(())
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(StrataError::Configuration(format!(
            "Invalid log level: {other}. Valid levels: trace, debug, info, warn, error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level_valid() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_parse_log_level_invalid() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }
}
