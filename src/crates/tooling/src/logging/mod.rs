//! Logging utilities
//!
//! Subscriber setup plus helpers for structured logging with tracing.

use crate::{Result, ToolingError};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Parameter names whose values never reach a log line.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "confirmation",
    "answer",
    "captcha",
    "code",
    "verification",
    "token",
    "secret",
];

/// Log levels for custom logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set. Calling this twice
/// returns an error instead of panicking.
pub fn init_tracing(default_level: LogLevel) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| ToolingError::Logging(e.to_string()))
}

/// Log execution time of a future
///
/// # Example
///
/// ```rust,ignore
/// use tooling::logging::timed;
///
/// let state = timed("wizard.resume", api.resume(&key)).await?;
/// ```
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    debug!("Starting: {}", name);

    let result = future.await;

    debug!("Completed: {} in {}", name, format_duration(start.elapsed()));
    result
}

/// RAII guard for logging scope entry and exit
///
/// # Example
///
/// ```rust
/// use tooling::logging::LogGuard;
///
/// fn submit_step() {
///     let _guard = LogGuard::new("submit_step");
///     // Guard will log exit when dropped
/// }
/// ```
pub struct LogGuard {
    name: String,
    start: Instant,
}

impl LogGuard {
    /// Create a new log guard
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_level(name, LogLevel::Debug)
    }

    /// Create a log guard with custom level
    pub fn with_level(name: impl Into<String>, level: LogLevel) -> Self {
        let name = name.into();

        match level {
            LogLevel::Debug => debug!("Entering: {}", name),
            LogLevel::Info => info!("Entering: {}", name),
            LogLevel::Warn => warn!("Entering: {}", name),
            LogLevel::Error => error!("Entering: {}", name),
        }

        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Get elapsed time since guard creation
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        debug!(
            "Exiting: {} (elapsed: {})",
            self.name,
            format_duration(self.start.elapsed())
        );
    }
}

/// Format duration in human-readable form
///
/// # Example
///
/// ```rust
/// use tooling::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
/// ```
pub fn format_duration(duration: std::time::Duration) -> String {
    let micros = duration.as_micros();

    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

static REDACTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)(password|passwd|pwd)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(session[\s_-]?token|token)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(secret)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(authorization|auth)\s*:\s*(bearer|basic)\s+\S+", "$1: $2 [REDACTED]"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid redaction pattern"), replacement))
    .collect()
});

/// Sanitize a free-form string for logging
///
/// # Example
///
/// ```rust
/// use tooling::logging::sanitize_for_logging;
///
/// let sanitized = sanitize_for_logging("password=hunter2");
/// assert!(sanitized.contains("[REDACTED]"));
/// ```
pub fn sanitize_for_logging(input: &str) -> String {
    REDACTIONS
        .iter()
        .fold(input.to_string(), |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
}

/// Copy of a JSON document with sensitive leaves replaced by `"[REDACTED]"`.
///
/// A key is sensitive when its lowercase form contains one of the known
/// markers (password, answer, code, token...). Nested objects and arrays are
/// walked recursively.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let lower = k.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) && !v.is_null() {
                        (k.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (k.clone(), redact_json(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_format_duration_micros() {
        assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
    }

    #[test]
    fn test_format_duration_millis() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
    }

    #[test]
    fn test_sanitize_password() {
        let sanitized = sanitize_for_logging("password: secret123");
        assert!(sanitized.contains("[REDACTED]"));
        assert!(!sanitized.contains("secret123"));
    }

    #[test]
    fn test_sanitize_session_token() {
        let sanitized = sanitize_for_logging("Session-Token=abc.def");
        assert!(!sanitized.contains("abc.def"));
    }

    #[test]
    fn test_sanitize_authorization_header() {
        let sanitized = sanitize_for_logging("Authorization: Basic YW5uOnNlY3JldA==");
        assert_eq!(sanitized, "Authorization: Basic [REDACTED]");
        assert_eq!(sanitize_for_logging("auth: bearer xyz"), "auth: bearer [REDACTED]");
    }

    #[test]
    fn test_sanitize_preserves_safe_data() {
        let input = "User: john@example.com, Status: active";
        assert_eq!(sanitize_for_logging(input), input);
    }

    #[test]
    fn test_redact_json_nested() {
        let params = json!({
            "user": {"name": "Ann", "email": "a@b.com"},
            "passwords": [{"type": "login", "value": "x", "confirmationValue": "x"}],
            "securityQuestion": {"question": "pet", "answer": "rex"},
            "smsVerification": "123456",
            "group": "G1"
        });

        let redacted = redact_json(&params);
        assert_eq!(redacted["user"]["name"], "Ann");
        assert_eq!(redacted["group"], "G1");
        assert_eq!(redacted["passwords"], "[REDACTED]");
        assert_eq!(redacted["securityQuestion"]["question"], "pet");
        assert_eq!(redacted["securityQuestion"]["answer"], "[REDACTED]");
        assert_eq!(redacted["smsVerification"], "[REDACTED]");
    }

    #[test]
    fn test_log_guard_elapsed() {
        let guard = LogGuard::new("test");
        std::thread::sleep(Duration::from_millis(10));
        assert!(guard.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_timed() {
        let result = timed("test_operation", async { 42 }).await;
        assert_eq!(result, 42);
    }
}
