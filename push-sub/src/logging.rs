//! Logging setup for the daemon.

use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable that overrides `--log-level`, in `EnvFilter` syntax.
pub const LOG_ENV: &str = "PUSH_SUB_LOG";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable single-line output
    Compact,
    /// One JSON object per line
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Install the global subscriber, logging to stderr.
///
/// `PUSH_SUB_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = create_env_filter(level)?;

    match format {
        LogFormat::Compact => Registry::default()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(filter)
            .try_init(),
        LogFormat::Json => Registry::default()
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| LoggingError::TracingInit(e.to_string()))
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&filter).map_err(|e| LoggingError::InvalidFilter {
        filter,
        reason: e.to_string(),
    })
}
