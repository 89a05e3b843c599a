/*!
 * Configuration management for ftbridge.
 *
 * Configuration is layered: built-in defaults, then an optional file, then
 * environment variables. Once built it is wrapped in a `SharedConfig` and is
 * never mutated again.
 */
use std::path::Path;
use std::sync::Arc;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Core configuration for ftbridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Controller and worker pool configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Device module configuration
    #[serde(default)]
    pub module: ModuleConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter` directive)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to include the event target in log lines
    #[serde(default = "default_true")]
    pub with_target: bool,

    /// Whether to include the thread name in log lines
    #[serde(default)]
    pub with_thread_names: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on blocking worker threads used for driver calls
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,

    /// Name given to blocking worker threads
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,

    /// How long an idle worker thread is kept alive, in milliseconds
    #[serde(default = "default_worker_keep_alive_ms")]
    pub worker_keep_alive_ms: u64,
}

/// Device module configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Name of the device class registered at module initialization
    #[serde(default = "default_device_class")]
    pub device_class: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
            with_thread_names: false,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_blocking_threads: default_max_blocking_threads(),
            worker_thread_name: default_worker_thread_name(),
            worker_keep_alive_ms: default_worker_keep_alive_ms(),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            device_class: default_device_class(),
        }
    }
}

fn default_app_name() -> String {
    "ftbridge".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// Same ceiling tokio applies when nothing is configured.
fn default_max_blocking_threads() -> usize {
    512
}

fn default_worker_thread_name() -> String {
    "ftbridge-worker".to_string()
}

fn default_worker_keep_alive_ms() -> u64 {
    10_000
}

fn default_device_class() -> String {
    "FTDI_Device".to_string()
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            return config.validated();
        }

        let mut config_builder = ConfigLib::builder().add_source(
            ConfigLib::try_from(&Config::default())
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            if Path::new(&config_file).exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        let config = config.validated()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }
}

impl Config {
    fn validated(self) -> Result<Self> {
        if self.runtime.max_blocking_threads == 0 {
            return Err(Error::config("runtime.max_blocking_threads must be at least 1"));
        }
        if self.module.device_class.trim().is_empty() {
            return Err(Error::config("module.device_class must not be empty"));
        }
        Ok(self)
    }
}

/// A read-only, shareable reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}
