//! Structured logging setup.
//!
//! Filters come from the `NGDB_LOG` environment variable, for example
//! `NGDB_LOG=neural_labelscan=debug` or `NGDB_LOG=warn,neural_labelscan::rebuild=trace`.
//!
//! ```ignore
//! use neural_labelscan::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber with default settings.
///
/// Subsequent calls are ignored (tracing only allows one subscriber).
pub fn init() {
    init_with_default("info");
}

/// Initializes the global tracing subscriber with a custom default level.
///
/// `default_level` applies only when `NGDB_LOG` is not set.
pub fn init_with_default(default_level: &str) {
    let filter = EnvFilter::try_from_env("NGDB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .compact();

    let _ = subscriber.try_init();
}

/// Initializes logging with JSON output format.
pub fn init_json(default_level: &str) {
    let filter = EnvFilter::try_from_env("NGDB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json();

    let _ = subscriber.try_init();
}

/// Initializes logging from the `[logging]` configuration section.
pub fn init_from_config(config: &LoggingConfig) {
    if config.json {
        init_json(&config.level);
    } else {
        init_with_default(&config.level);
    }
}
