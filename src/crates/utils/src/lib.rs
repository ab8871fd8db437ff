//! HTTP client and configuration helpers for the wizard driver.
//!
//! # Modules
//!
//! ## Client (`client`)
//!
//! HTTP client with retry logic and authentication helpers:
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_max_retries(3)
//!     .with_user_agent("wizard-driver");
//!
//! let client = HttpClient::new(config)?;
//! let response = client.get("https://bank.example.com/api/wizard-executions/abc").await?;
//! ```
//!
//! ## Config (`config`)
//!
//! Environment variable and file loading:
//!
//! ```rust,ignore
//! use utils::config::{get_env, load_config_file};
//!
//! let base_url = get_env("WIZARD_BASE_URL")?;
//! let config: MyConfig = load_config_file("wizard.toml")?;
//! ```
//!
//! # Features
//!
//! - `client` - Client utilities (enabled by default)
//! - `config` - Configuration utilities (enabled by default)

pub mod error;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "config")]
pub mod config;

// Re-export commonly used types
pub use error::{Result, UtilsError};

#[cfg(feature = "client")]
pub use client::{AuthHelper, ClientConfig, HttpClient};

#[cfg(feature = "config")]
pub use config::{
    get_env, get_env_or, get_env_parse, get_env_parse_or, load_config_file, load_json_config,
    load_toml_config, load_yaml_config, FromEnv, ValidateConfig,
};
