//! Layered configuration for the analysis fabric.
//!
//! Settings load from, in priority order:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use xray_fabric::config::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("Ingress listening on: {}", config.api.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `XRAY_FABRIC__<section>__<key>`, e.g.
//! `XRAY_FABRIC__API__BIND_ADDR=0.0.0.0:9000`.
//!
//! # Configuration File
//!
//! By default, configuration is loaded from `config/xray-fabric.toml`. This
//! can be overridden with the `XRAY_FABRIC_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    ApiConfig, CallbackConfig, Config, ImageDownloadConfig, PipelineConfig, QueueConfig,
    StoreConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path; useful for tests.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
