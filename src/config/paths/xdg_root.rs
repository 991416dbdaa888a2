//! XDG Base Directory utilities for catalog data and configuration.

use crate::error::ApiError;
use std::path::PathBuf;

/// Directory name used under the XDG roots
pub const APP_DIR_NAME: &str = "pollen-catalog";

/// Get XDG data home directory
///
/// Returns `$XDG_DATA_HOME` if set, otherwise defaults to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// Get the catalog's data root: `$XDG_DATA_HOME/pollen-catalog/`
pub fn app_data_dir() -> Result<PathBuf, ApiError> {
    let data_home = data_home().ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(data_home.join(APP_DIR_NAME))
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// Global config file: `$XDG_CONFIG_HOME/pollen-catalog/config.toml`
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join(APP_DIR_NAME).join("config.toml"))
}
