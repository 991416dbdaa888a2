//! Global config file source: `$XDG_CONFIG_HOME/pollen-catalog/config.toml`

use crate::config::paths;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};

/// Add the global config file to builder when it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = match paths::global_config_path() {
        Ok(path) => path,
        Err(_) => return Ok(builder),
    };
    if !path.exists() {
        return Ok(builder);
    }
    tracing::debug!(path = %path.display(), "Loading global config file");
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}
