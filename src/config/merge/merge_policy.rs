//! Builder seeded with the built-in defaults.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

/// Config builder carrying the defaults every other source overrides.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("controller.upload_progress_steps", 5i64)?
        .set_default("controller.upload_progress_interval_ms", 100i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}
