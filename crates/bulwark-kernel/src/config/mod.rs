//! Settings file loading
//!
//! Loads resilience settings from YAML, TOML, JSON, INI, RON or JSON5, with
//! `${VAR}` / `$VAR` environment substitution applied before parsing and
//! optional `PREFIX__FIELD` environment overrides layered on top.
//!
//! Errors are reported as [`error_stack::Report<ConfigError>`] with the file
//! path and detected format attached.

use crate::error::{ConfigError, ConfigResult};
use config::{Config as Cfg, Environment, File};
use error_stack::{Report, ResultExt};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::LazyLock;

pub use config::FileFormat;

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("braced env var pattern is valid")
});

static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("bare env var pattern is valid")
});

/// Detect the settings format from a file extension.
///
/// # Supported Extensions
///
/// - YAML: `.yaml`, `.yml`
/// - TOML: `.toml`
/// - JSON: `.json`
/// - INI: `.ini`
/// - RON: `.ron`
/// - JSON5: `.json5`
pub fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            Report::new(ConfigError::UnsupportedFormat(
                "No file extension found".to_string(),
            ))
        })
        .attach(format!("path: {path}"))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(Report::new(ConfigError::UnsupportedFormat(ext.to_string()))
            .attach(format!("path: {path}"))),
    }
}

/// Substitute environment variables in a string.
///
/// `${VAR}` is replaced first, then `$VAR`. Unknown variables are left as
/// written.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    BARE_VAR
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Parse settings from a string in an explicit format.
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted = substitute_env_vars(content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| Report::new(ConfigError::Parse(e.to_string())))
        .attach(format!("format: {format:?}"))?;

    config
        .try_deserialize()
        .map_err(|e| Report::new(ConfigError::Serialization(e.to_string())))
}

/// Load settings from a file, detecting the format from its extension.
pub fn load_config<T>(path: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| Report::new(ConfigError::from(e)))
        .attach(format!("reading {path}"))?;

    from_str(&content, format).attach(format!("loading {path}"))
}

/// Load settings from a file and layer `PREFIX__FIELD` environment
/// variables on top (double underscore separates nested fields).
pub fn load_with_env<T>(path: &str, env_prefix: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| Report::new(ConfigError::from(e)))
        .attach(format!("reading {path}"))?;
    let substituted = substitute_env_vars(&content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .map_err(|e| Report::new(ConfigError::Parse(e.to_string())))
        .attach(format!("loading {path}"))?;

    config
        .try_deserialize()
        .map_err(|e| Report::new(ConfigError::Serialization(e.to_string())))
        .attach(format!("loading {path}"))
}
