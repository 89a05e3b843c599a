/*!
 * Logging functionality for ftbridge.
 *
 * This module provides tracing setup and the span helpers used by the device
 * crate to tag driver calls and open requests.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_from_config(&LoggingConfig::default())
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "ftbridge_devices=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    init_from_config(&LoggingConfig {
        level: filter.to_string(),
        ..LoggingConfig::default()
    })
}

/// Initialize the logging system from the `[logging]` configuration section.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("Invalid log filter '{}': {}", config.level, e)))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_names),
        )
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for a component
///
/// # Arguments
///
/// * `name` - The name of the component
/// * `id` - An optional ID for the component instance
pub fn component_span(name: &str, id: Option<&str>) -> Span {
    match id {
        Some(id) => tracing::info_span!("component", name = %name, id = %id),
        None => tracing::info_span!("component", name = %name),
    }
}

/// Create a new span for an operation
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `component` - The component performing the operation
pub fn operation_span(name: &str, component: &str) -> Span {
    tracing::info_span!("operation", name = %name, component = %component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        // A second global subscriber cannot be installed, so only the first
        // call in this process may succeed.
        let first = init();
        let second = init_with_filter("debug");
        assert!(first.is_err() || second.is_err());
    }

    #[test]
    fn test_invalid_filter() {
        let config = LoggingConfig {
            level: "ftbridge=loudest".to_string(),
            ..LoggingConfig::default()
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(init_from_config(&config), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_spans_without_subscriber() {
        let span = component_span("FTDI_Device", Some("A1B2C3"));
        let _guard = span.enter();

        let span = operation_span("purge", "FTDI_Device");
        span.in_scope(|| tracing::debug!("inside operation span"));
    }
}
