//! Structured logging setup.
//!
//! One call at process start wires tracing-subscriber according to the
//! logging section of the configuration. `RUST_LOG` takes precedence over
//! the configured level when set.

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber from configuration.
///
/// Safe to call once; a second call is ignored (some test harnesses race
/// on initialization).
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let result = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if result.is_ok() {
        info!(app = %config.app_name, "logging initialized");
    }
}
