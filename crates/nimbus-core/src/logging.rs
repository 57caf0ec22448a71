//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` if it parses, else `config.level`
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global fmt subscriber
///
/// Returns false if a subscriber was already installed, which is harmless
/// when several tests initialise logging.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = env_filter(config);

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    result.is_ok()
}
