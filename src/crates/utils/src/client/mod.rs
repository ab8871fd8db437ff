//! HTTP client utilities and helpers.
//!
//! This module provides utilities for building HTTP clients including:
//! - Client configuration builders
//! - Request sending with retry logic for idempotent requests
//! - Authentication helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//!
//! let config = ClientConfig::new()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_max_retries(3);
//!
//! let client = HttpClient::new(config)?;
//! ```

use crate::error::{Result, UtilsError};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum number of retries for failed idempotent requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between retries.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Backoff multiplier for retry delays.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f32,

    /// User agent string.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Default headers to include in all requests.
    #[serde(skip)]
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Create a new client configuration with defaults.
    pub fn new() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            user_agent: None,
            default_headers: Vec::new(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a default header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f32 {
    2.0
}

/// HTTP client with retry and configuration support.
///
/// Only idempotent requests (GET) are retried. A POST that reached the server
/// may already have advanced remote state, so its failure is returned as-is and
/// retrying is left to the caller.
pub struct HttpClient {
    config: ClientConfig,
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|e| UtilsError::ClientError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get a reference to the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a GET request.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url).await
    }

    /// Send a POST request with JSON body.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response> {
        self.post_json_with_query(url, &[], body).await
    }

    /// Send a POST request with JSON body and query parameters.
    pub async fn post_json_with_query<T: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &T,
    ) -> Result<Response> {
        let mut req = self.with_default_headers(self.client.post(url));
        if !query.is_empty() {
            req = req.query(query);
        }
        req = req.json(body);

        self.send_once(req).await
    }

    /// Send a bodiless request with the given method.
    pub async fn request(&self, method: Method, url: &str) -> Result<Response> {
        let idempotent = matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let req = self.with_default_headers(self.client.request(method, url));

        if idempotent {
            self.send_with_retry(req).await
        } else {
            self.send_once(req).await
        }
    }

    fn with_default_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }
        req
    }

    async fn send_once(&self, req: reqwest::RequestBuilder) -> Result<Response> {
        req.send().await.map_err(UtilsError::HttpError)
    }

    /// Send a request builder with retry logic.
    async fn send_with_retry(&self, req: reqwest::RequestBuilder) -> Result<Response> {
        let mut attempts = 0;
        let mut delay = self.config.retry_delay;

        loop {
            let request = req
                .try_clone()
                .ok_or_else(|| UtilsError::ClientError("Failed to clone request".to_string()))?;

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() || attempts >= self.config.max_retries {
                        return Ok(response);
                    }

                    // Only 5xx responses are worth another attempt
                    if !response.status().is_server_error() {
                        return Ok(response);
                    }
                    warn!(status = %response.status(), attempt = attempts + 1, "server error, retrying");
                }
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        return Err(UtilsError::HttpError(e));
                    }

                    if !e.is_timeout() && !e.is_connect() {
                        return Err(UtilsError::HttpError(e));
                    }
                    debug!(error = %e, attempt = attempts + 1, "transport error, retrying");
                }
            }

            attempts += 1;
            tokio::time::sleep(delay).await;
            delay = Duration::from_secs_f32(delay.as_secs_f32() * self.config.backoff_multiplier);
        }
    }
}

/// Helper for building authenticated requests.
pub struct AuthHelper;

impl AuthHelper {
    /// Header name used by the banking API for session tokens.
    pub const SESSION_TOKEN_HEADER: &'static str = "Session-Token";

    /// Create a basic auth authorization header value.
    pub fn basic_auth(username: &str, password: &str) -> String {
        use base64::Engine;
        let credentials = format!("{}:{}", username, password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        format!("Basic {}", encoded)
    }

    /// Header pair carrying a session token.
    pub fn session_token(token: &str) -> (String, String) {
        (Self::SESSION_TOKEN_HEADER.to_string(), token.to_string())
    }
}
