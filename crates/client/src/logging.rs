//! Logging initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the global subscriber once for the binary.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format.as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        "compact" => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
        _ => registry
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    result.is_ok()
}
