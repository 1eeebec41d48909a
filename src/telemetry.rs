//! Shared logging bootstrap for the mqexport binaries.

use crate::{Error, Result};

use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the process-wide JSON subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `log_level`.
pub fn init_logging(service_name: &str, log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level)?;
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives.trim())
            .map_err(|e| Error::Config(format!("invalid RUST_LOG directives: {e}")))?,
        _ => EnvFilter::new(level.as_str()),
    };

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging subscriber: {e}")))?;

    info!(service_name = %service_name, log_level = %level, "Logging initialized");
    Ok(())
}

pub fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_known_levels() {
        assert_eq!(parse_log_level("INFO").unwrap(), Level::INFO);
        assert_eq!(parse_log_level(" warning ").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
    }

    #[test]
    fn parse_log_level_rejects_unknown_levels() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(format!("{err}").contains("invalid log level"));
    }
}
