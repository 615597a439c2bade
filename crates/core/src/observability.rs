//! Structured logging initialization
//!
//! Thin wrapper over `tracing-subscriber`. Services embedding the engine call
//! [`init_logging`] once at startup; library code only emits `tracing` events
//! and never installs a subscriber on its own.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigLoader, parse_env_var};
use crate::error::RecError;

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Single-line output for terminals and CI
    Compact,
    /// Newline-delimited JSON for log shippers
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging configuration
///
/// # Environment Variables
///
/// - `RECSTACK_LOG_LEVEL` (optional): filter directive, default "info"
/// - `RECSTACK_LOG_FORMAT` (optional): pretty | compact | json, default pretty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. "info" or "recstack_engine=debug"
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl ConfigLoader for LogConfig {
    fn from_env() -> Result<Self, RecError> {
        let level = std::env::var("RECSTACK_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| LogConfig::default().level);
        let format = parse_env_var("RECSTACK_LOG_FORMAT", LogFormat::default())?;
        Ok(Self { level, format })
    }

    fn validate(&self) -> Result<(), RecError> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            RecError::configuration(
                format!("invalid log filter '{}': {e}", self.level),
                "RECSTACK_LOG_LEVEL",
            )
        })?;
        Ok(())
    }
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns a `ConfigurationError` when the filter directive is invalid or a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), RecError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        RecError::configuration(
            format!("invalid log filter '{}': {e}", config.level),
            "RECSTACK_LOG_LEVEL",
        )
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| {
        RecError::configuration(format!("failed to install subscriber: {e}"), "logging")
    })
}
