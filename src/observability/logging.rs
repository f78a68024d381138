//! # Structured Logging
//!
//! Installs the process-wide `tracing` subscriber. `RUST_LOG` directives are honoured and the
//! configured level is added on top; output is either human-readable text or one JSON object
//! per line.

use tracing::{warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::config::LoggingConfig;

/// Unknown names fall back to `INFO`
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the tracing subscriber
///
/// Returns `false` when a subscriber was already installed, e.g. by a test harness.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::from_default_env().add_directive(parse_level(&config.level).into());

    let result = if config.format.eq_ignore_ascii_case("json") {
        Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
        return false;
    }
    true
}
