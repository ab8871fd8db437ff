//! Configuration management utilities.
//!
//! This module provides utilities for loading configuration including:
//! - Environment variable loading with type parsing
//! - Configuration validation
//! - YAML/JSON/TOML config file loading
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::config::{get_env, get_env_parse, load_config_file};
//!
//! let base_url = get_env("WIZARD_BASE_URL")?;
//! let retries = get_env_parse::<u32>("WIZARD_MAX_RETRIES")?;
//! let config: WizardConfig = load_config_file("wizard.yaml")?;
//! ```

use crate::error::{Result, UtilsError};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Get an environment variable as a string.
pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|e| {
        UtilsError::ConfigError(format!("Environment variable '{}' not found: {}", key, e))
    })
}

/// Get an environment variable and parse it to the specified type.
pub fn get_env_parse<T: std::str::FromStr>(key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let value = get_env(key)?;
    value.parse::<T>().map_err(|e| {
        UtilsError::ConfigError(format!(
            "Failed to parse environment variable '{}': {}",
            key, e
        ))
    })
}

/// Get an environment variable with a default value.
pub fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable and parse it, or use a default value.
pub fn get_env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    get_env_parse(key).unwrap_or(default)
}

/// Load configuration from a YAML file.
pub fn load_yaml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_yaml::from_str(&content).map_err(|e| {
        UtilsError::ConfigError(format!(
            "Failed to parse YAML config from {:?}: {}",
            path.as_ref(),
            e
        ))
    })
}

/// Load configuration from a JSON file.
pub fn load_json_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&content).map_err(|e| {
        UtilsError::ConfigError(format!(
            "Failed to parse JSON config from {:?}: {}",
            path.as_ref(),
            e
        ))
    })
}

/// Load configuration from a TOML file.
pub fn load_toml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path.as_ref())?;
    toml::from_str(&content).map_err(|e| {
        UtilsError::ConfigError(format!(
            "Failed to parse TOML config from {:?}: {}",
            path.as_ref(),
            e
        ))
    })
}

/// Load configuration from a file (auto-detect format from extension).
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            UtilsError::ConfigError(format!("Unable to determine file extension for {:?}", path))
        })?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => load_yaml_config(path),
        "json" => load_json_config(path),
        "toml" => load_toml_config(path),
        _ => Err(UtilsError::ConfigError(format!(
            "Unsupported config file extension: {}",
            extension
        ))),
    }
}

/// Trait for types that can be loaded from environment variables.
pub trait FromEnv: Sized {
    /// Load configuration from environment variables with the given prefix.
    fn from_env(prefix: &str) -> Result<Self>;
}

/// Trait for validating configuration.
pub trait ValidateConfig {
    /// Validate the configuration, returning an error if invalid.
    fn validate(&self) -> Result<()>;
}
