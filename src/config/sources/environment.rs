//! Environment variable source: POLLEN prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix for configuration environment variables, e.g. `POLLEN__STORAGE__DATA_DIR`
pub const ENV_PREFIX: &str = "POLLEN";

/// Add environment variable overlay to builder.
/// Uses POLLEN prefix and __ as separator for nested keys.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
