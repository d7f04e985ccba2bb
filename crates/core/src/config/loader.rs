use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::debug;

use super::{types::Config, validate_config, ConfigError};

/// Environment variables with this prefix override file values.
///
/// Nested keys are separated by a double underscore so that field names may
/// keep their own underscores: `REELFETCH_SEARCH__TIMEOUT_SECS=10`.
pub const ENV_PREFIX: &str = "REELFETCH_";

/// Load and validate configuration from a TOML file plus environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    validate_config(&config)?;
    debug!(
        path = %path.display(),
        capability_indexers = config.indexers.capability.len(),
        specialized_indexers = config.indexers.specialized.len(),
        download_clients = config.download_clients.len(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Parse configuration from a TOML string without validating it.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
