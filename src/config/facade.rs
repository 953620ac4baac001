//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::NodeVaultConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
///
/// Precedence (lowest to highest): built-in defaults, the global file
/// `$XDG_CONFIG_HOME/nodevault/config.toml`, an explicit file, then
/// `NODEVAULT__SECTION__KEY` environment variables.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file and environment.
    pub fn load() -> Result<NodeVaultConfig, ApiError> {
        let config = MergeService::load(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with an explicit file layered over the global one.
    pub fn load_from_file(path: &Path) -> Result<NodeVaultConfig, ApiError> {
        let config = MergeService::load(Some(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> NodeVaultConfig {
        NodeVaultConfig::default()
    }
}
