//! Configuration
//!
//! Layered settings for the store, the state controller and logging. See
//! [`ConfigLoader`] for source precedence.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use crate::logging::LoggingConfig;
pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeVaultConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024
}

fn default_flush_every_ms() -> Option<u64> {
    Some(500)
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory; None means `$XDG_DATA_HOME/nodevault/store`
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Page cache size in bytes
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity_bytes: u64,

    /// Background flush interval; None disables periodic flushing
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: Option<u64>,
}

impl StorageConfig {
    /// Resolve the database directory.
    pub fn resolve_path(&self) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Ok(xdg::data_dir()?.join("store")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_capacity_bytes: default_cache_capacity(),
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

fn default_progress_steps() -> u32 {
    5
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_load_error_message() -> String {
    "Failed to load folder".to_string()
}

/// State controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Number of cosmetic progress updates emitted per upload
    #[serde(default = "default_progress_steps")]
    pub upload_progress_steps: u32,

    /// Delay between cosmetic progress updates
    #[serde(default = "default_progress_interval_ms")]
    pub upload_progress_interval_ms: u64,

    /// Message shown when a folder cannot be loaded
    #[serde(default = "default_load_error_message")]
    pub load_error_message: String,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.upload_progress_steps == 0 {
            return Err(ApiError::ConfigError(
                "controller.upload_progress_steps must be at least 1".to_string(),
            ));
        }
        if self.load_error_message.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "controller.load_error_message cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            upload_progress_steps: default_progress_steps(),
            upload_progress_interval_ms: default_progress_interval_ms(),
            load_error_message: default_load_error_message(),
        }
    }
}

impl NodeVaultConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        self.controller.validate()
    }
}
