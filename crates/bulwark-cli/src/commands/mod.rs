//! CLI command implementations

pub mod check;
pub mod run;

use std::path::Path;

use bulwark_foundation::ResilienceSettings;

use crate::error::CliError;

/// Load settings from `path`, or fall back to the defaults when no file was
/// given. With `env_prefix`, `PREFIX__FIELD` variables override file values.
pub fn load_settings(
    path: Option<&Path>,
    env_prefix: Option<&str>,
) -> Result<ResilienceSettings, CliError> {
    let Some(path) = path else {
        tracing::debug!("no settings file given, using defaults");
        return Ok(ResilienceSettings::default());
    };

    let path_str = path
        .to_str()
        .ok_or_else(|| CliError::ConfigError(format!("non UTF-8 path: {}", path.display())))?;

    let loaded = match env_prefix {
        Some(prefix) => ResilienceSettings::load_with_env(path_str, prefix),
        None => ResilienceSettings::load(path_str),
    };
    loaded.map_err(|report| {
        CliError::ConfigError(format!("failed to load {}: {report:?}", path.display()))
    })
}
