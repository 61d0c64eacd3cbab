mod adapter;
mod model;
mod raw;

use std::path::Path;

pub use model::{Config, ShutdownSettings, DEFAULT_GRACE};

/// File names looked up when no configuration path is given.
pub const DEFAULT_FILENAMES: [&str; 2] = ["overture.toml", ".overture.toml"];

/// Error type for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "toml")]
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Load a configuration from a file path.
///
/// Relative working directories are resolved against the file's directory.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_auto(&text, path)
}

/// Parse a configuration, picking the format from the file extension.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
pub fn parse_auto(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml")]
        "toml" => parse_toml(text, base_dir),
        _ => Err(ConfigError::Validation(format!(
            "unknown config extension `{ext}`"
        ))),
    }
}

/// Parse a TOML configuration.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
#[cfg(feature = "toml")]
pub fn parse_toml(config: &str, base_dir: &Path) -> Result<Config, ConfigError> {
    let raw_project = toml::from_str::<raw::RawProject>(config)?;
    raw_project.to_config(base_dir)
}
