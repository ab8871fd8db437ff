//! Driver configuration
//!
//! Loaded from a YAML/JSON/TOML file or from `WIZARD_*` environment
//! variables:
//!
//! | Variable               | Field           |
//! |------------------------|-----------------|
//! | `WIZARD_BASE_URL`      | `base_url`      |
//! | `WIZARD_RESUME_PATH`   | `resume_path`   |
//! | `WIZARD_MARKER_KEY`    | `marker_key`    |
//! | `WIZARD_STORE_PATH`    | `store_path`    |
//! | `WIZARD_SESSION_TOKEN` | `session_token` |
//! | `WIZARD_USERNAME`      | `credentials.username` |
//! | `WIZARD_PASSWORD`      | `credentials.password` |
//! | `WIZARD_CHANNEL`       | `channel`       |
//! | `WIZARD_TIMEOUT_SECS`  | `client.timeout`|
//! | `WIZARD_MAX_RETRIES`   | `client.max_retries` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use utils::config::{get_env, get_env_or, get_env_parse_or, load_config_file, FromEnv, ValidateConfig};
use utils::{ClientConfig, UtilsError};

/// Placeholder substituted with the execution key in `resume_path`
pub const KEY_PLACEHOLDER: &str = "{key}";

fn default_resume_path() -> String {
    "/wizard/run/{key}".to_string()
}

fn default_marker_key() -> String {
    "wizard.registration.key".to_string()
}

fn default_channel() -> String {
    "main".to_string()
}

/// Login sent as HTTP Basic authentication instead of a session token
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Configuration for [`WizardDriver`](crate::WizardDriver)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Root of the REST API, e.g. `https://bank.example/api`
    pub base_url: String,

    /// Canonical "resume by key" address template
    #[serde(default = "default_resume_path")]
    pub resume_path: String,

    /// Store key holding the resumable registration key
    #[serde(default = "default_marker_key")]
    pub marker_key: String,

    /// JSON file backing the durable store; in-memory when absent
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub session_token: Option<String>,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    #[serde(default = "default_channel")]
    pub channel: String,
}

impl WizardConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            resume_path: default_resume_path(),
            marker_key: default_marker_key(),
            store_path: None,
            client: ClientConfig::default(),
            session_token: None,
            credentials: None,
            channel: default_channel(),
        }
    }

    pub fn with_resume_path(mut self, path: impl Into<String>) -> Self {
        self.resume_path = path.into();
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> utils::Result<Self> {
        let config: Self = load_config_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Resume address for an execution key
    pub fn resume_address(&self, key: &str) -> String {
        self.resume_path.replace(KEY_PLACEHOLDER, key)
    }
}

impl FromEnv for WizardConfig {
    fn from_env(prefix: &str) -> utils::Result<Self> {
        let var = |name: &str| format!("{}{}", prefix, name);

        let mut client = ClientConfig::default();
        client.timeout = Duration::from_secs(get_env_parse_or(&var("TIMEOUT_SECS"), 30u64));
        client.max_retries = get_env_parse_or(&var("MAX_RETRIES"), client.max_retries);

        let config = Self {
            base_url: get_env(&var("BASE_URL"))?,
            resume_path: get_env_or(&var("RESUME_PATH"), &default_resume_path()),
            marker_key: get_env_or(&var("MARKER_KEY"), &default_marker_key()),
            store_path: get_env(&var("STORE_PATH")).ok().map(PathBuf::from),
            client,
            session_token: get_env(&var("SESSION_TOKEN")).ok(),
            credentials: match (get_env(&var("USERNAME")), get_env(&var("PASSWORD"))) {
                (Ok(username), Ok(password)) => Some(Credentials { username, password }),
                _ => None,
            },
            channel: get_env_or(&var("CHANNEL"), &default_channel()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl ValidateConfig for WizardConfig {
    fn validate(&self) -> utils::Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(UtilsError::ConfigError("base_url must not be empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(UtilsError::ConfigError(format!(
                "base_url must use http or https: {}",
                base
            )));
        }
        if !self.resume_path.contains(KEY_PLACEHOLDER) {
            return Err(UtilsError::ConfigError(format!(
                "resume_path must contain {}: {}",
                KEY_PLACEHOLDER, self.resume_path
            )));
        }
        if self.session_token.is_some() && self.credentials.is_some() {
            return Err(UtilsError::ConfigError(
                "use either session_token or credentials, not both".to_string(),
            ));
        }
        if self.marker_key.trim().is_empty() {
            return Err(UtilsError::ConfigError("marker_key must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WizardConfig::new("https://bank.example/api");
        assert!(config.validate().is_ok());
        assert_eq!(config.resume_address("k1"), "/wizard/run/k1");
        assert_eq!(config.channel, "main");
    }

    #[test]
    fn test_validation_failures() {
        assert!(WizardConfig::new("").validate().is_err());
        assert!(WizardConfig::new("ftp://bank").validate().is_err());
        assert!(WizardConfig::new("https://bank")
            .with_resume_path("/wizard/run")
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_env() {
        env::set_var("WIZTEST_BASE_URL", "http://localhost:8888/api");
        env::set_var("WIZTEST_SESSION_TOKEN", "tok");
        env::set_var("WIZTEST_MAX_RETRIES", "5");

        let config = WizardConfig::from_env("WIZTEST_").unwrap();
        assert_eq!(config.base_url, "http://localhost:8888/api");
        assert_eq!(config.session_token.as_deref(), Some("tok"));
        assert_eq!(config.client.max_retries, 5);
        assert!(config.store_path.is_none());

        env::remove_var("WIZTEST_BASE_URL");
        env::remove_var("WIZTEST_SESSION_TOKEN");
        env::remove_var("WIZTEST_MAX_RETRIES");
    }

    #[test]
    fn test_credentials_exclude_session_token() {
        let config = WizardConfig::new("https://bank").with_credentials("ann", "secret");
        assert!(config.validate().is_ok());
        assert!(!format!("{:?}", config).contains("secret"));
        assert!(config.with_session_token("tok").validate().is_err());
    }

    #[test]
    fn test_from_env_requires_base_url() {
        assert!(WizardConfig::from_env("WIZTEST_MISSING_").is_err());
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wizard.yaml");
        fs::write(
            &path,
            "base_url: https://bank.example/api\nresume_path: /r/{key}\nstore_path: /tmp/w.json\n",
        )
        .unwrap();

        let config = WizardConfig::load(&path).unwrap();
        assert_eq!(config.resume_address("abc"), "/r/abc");
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/w.json")));
        assert_eq!(config.marker_key, "wizard.registration.key");
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wizard.toml");
        fs::write(&path, "base_url = \"https://bank\"\nresume_path = \"/nokey\"\n").unwrap();
        assert!(matches!(
            WizardConfig::load(&path),
            Err(UtilsError::ConfigError(_))
        ));
    }
}
