/*!
 * ftbridge Core
 *
 * This crate provides the controller runtime, configuration, logging and
 * error types shared by the ftbridge device crate.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod runtime;
pub mod types;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use anyhow;
    pub use chrono;
    pub use futures;
    pub use serde;
    pub use tokio;
    pub use tracing;
    pub use uuid;
}

/// ftbridge core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("ftbridge core {} initialized", VERSION);
    Ok(())
}

/// Library initialization from a loaded configuration
pub fn init_with_config(config: &config::Config) -> Result<(), error::Error> {
    logging::init_from_config(&config.logging)?;
    tracing::info!(
        app = %config.general.app_name,
        environment = %config.general.environment,
        "ftbridge core {} initialized",
        VERSION
    );
    Ok(())
}
