//! MergeService: orchestrates sources, applies merge policy, deserializes to NodeVaultConfig.

use crate::config::sources::{environment, explicit_file, global_file};
use crate::config::NodeVaultConfig;
use config::ConfigError;
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults -> global file -> explicit file -> environment.
    pub fn load(explicit: Option<&Path>) -> Result<NodeVaultConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => explicit_file::add_to_builder(builder, path)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
