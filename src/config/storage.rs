//! StorageConfig and path resolution for the local database and fallback cache.

use crate::config::paths;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_database_name() -> String {
    "pollenpedia".to_string()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all catalog data; None means `$XDG_DATA_HOME/pollen-catalog`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Name of the object store database (directory under the data root)
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

impl StorageConfig {
    /// Storage rooted at an explicit directory
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    /// Resolve the data root directory.
    pub fn data_root(&self) -> Result<PathBuf, ApiError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::app_data_dir(),
        }
    }

    /// Directory holding the object store database
    pub fn database_path(&self) -> Result<PathBuf, ApiError> {
        Ok(self.data_root()?.join(&self.database_name))
    }

    /// Directory holding the secondary fallback cache
    pub fn fallback_cache_path(&self) -> Result<PathBuf, ApiError> {
        Ok(self.data_root()?.join("fallback-cache"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_name: default_database_name(),
        }
    }
}
