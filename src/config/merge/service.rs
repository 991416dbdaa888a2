//! MergeService: orchestrates sources and deserializes to CatalogConfig.

use crate::config::sources::{environment, global_file};
use crate::config::CatalogConfig;
use config::{Config, ConfigError, File, FileFormat};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from standard sources.
    /// Precedence: defaults (lowest) -> global file -> environment (highest).
    pub fn load() -> Result<CatalogConfig, ConfigError> {
        let builder = Config::builder();
        let builder = global_file::add_to_builder(builder)?;
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load config from a specific file with global file underneath and environment overlay.
    pub fn load_from_file(path: &Path) -> Result<CatalogConfig, ConfigError> {
        let builder = Config::builder();
        let builder = global_file::add_to_builder(builder)?;
        let builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
