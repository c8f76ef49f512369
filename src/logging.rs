//! Tracing subscriber setup for the `forge` binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,study_forge=debug";

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub json_format: bool,
}

impl LoggingConfig {
    /// `LOG_FORMAT=json` switches to the JSON formatter.
    pub fn from_env() -> Self {
        let json_format = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self { json_format }
    }
}

/// Install the global subscriber, writing to stderr so stdout stays
/// machine-readable. Calling it twice is a no-op.
pub fn init_tracing(config: LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(json_format = config.json_format, "logging initialized");
    }
}
