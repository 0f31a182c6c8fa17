//! Diagnostic logging setup.
//!
//! The library only emits `tracing` events; applications decide whether to
//! install a subscriber. [`init_logging`] installs one writing to stderr so
//! diagnostics never interleave with command output on stdout.
//!
//! The filter comes from, in order:
//!
//! 1. the `BURROW_LOG` environment variable,
//! 2. [`LoggingConfig::level`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{ConfigError, LogFormat, LoggingConfig};

/// Environment variable overriding the configured filter.
pub const LOG_ENV: &str = "BURROW_LOG";

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config)?;
    let base = Registry::default().with(filter);

    let result = match config.format {
        LogFormat::Json => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(config.ansi)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| ConfigError::InvalidFilter(e.to_string()))
}
