//! Catalog configuration.
//!
//! Layered with the `config` crate: serde defaults, then the global
//! `config.toml`, then an optional explicit file, then `POLLEN__*` environment
//! variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage;

pub use facade::ConfigLoader;
pub use storage::StorageConfig;

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Local storage quota commonly granted to a browser origin's key-value store
pub const DEFAULT_FALLBACK_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

/// Largest accepted image upload
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

fn default_fallback_prefix() -> String {
    "image-".to_string()
}

fn default_fallback_capacity() -> u64 {
    DEFAULT_FALLBACK_CAPACITY_BYTES
}

fn default_max_upload() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_true() -> bool {
    true
}

/// Image storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Prefix prepended to image keys in the fallback cache namespace
    #[serde(default = "default_fallback_prefix")]
    pub fallback_prefix: String,

    /// Total bytes the fallback cache may hold
    #[serde(default = "default_fallback_capacity")]
    pub fallback_capacity_bytes: u64,

    /// Upload size limit
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            fallback_prefix: default_fallback_prefix(),
            fallback_capacity_bytes: default_fallback_capacity(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

/// First-run seed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Convert seed image URLs into stored image blobs on first run
    #[serde(default = "default_true")]
    pub convert_images: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            convert_images: default_true(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub seed: SeedConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}
