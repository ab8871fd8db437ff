//! Error taxonomy for wizard execution
//!
//! Every operation of the driver returns [`Result`]. The variants mirror how a
//! presentation layer is expected to react:
//!
//! ```text
//! WizardError
//! ├── Validation          - Local field errors, nothing was sent
//! ├── ExpiredExecution    - Key no longer recognized, restart the process
//! ├── NotFound            - Unknown or disabled wizard
//! ├── ProviderCallback    - Identity provider reported a failure
//! ├── CallbackFailed      - Callback outcome not understood, flow ends
//! ├── IllegalState        - Operation not allowed for the current state
//! ├── TransitionInFlight  - Another remote operation is pending for this key
//! ├── Request             - Network or server failure, safe to retry
//! ├── InvalidResponse     - Server sent a state violating the model invariants
//! ├── Store               - Durable store failure
//! ├── Serialization       - JSON encoding/decoding failure
//! └── Configuration       - Invalid driver configuration
//! ```
//!
//! # Example
//!
//! ```rust
//! use wizard_core::error::WizardError;
//!
//! fn describe(err: &WizardError) -> &'static str {
//!     if err.requires_restart() {
//!         "The process has expired, please start again"
//!     } else if err.is_retryable() {
//!         "Temporary failure, please try again"
//!     } else {
//!         "Cannot continue"
//!     }
//! }
//!
//! let err = WizardError::ExpiredExecution { key: "k1".to_string() };
//! assert_eq!(describe(&err), "The process has expired, please start again");
//! ```

use std::collections::BTreeMap;
use thiserror::Error;
use utils::UtilsError;
use wizard_checkpoint::CheckpointError;

/// Field path to the messages of every rule that failed for it
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Convenience result type using [`WizardError`]
pub type Result<T> = std::result::Result<T, WizardError>;

/// Errors produced while driving a wizard execution
#[derive(Error, Debug)]
pub enum WizardError {
    /// The current step did not validate
    ///
    /// Raised locally before any network call, or mapped from server-side
    /// property errors. The map is keyed by field path.
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// The server no longer recognizes the execution key
    ///
    /// **Recovery**: start the wizard again.
    #[error("Wizard execution '{key}' has expired or is unknown")]
    ExpiredExecution {
        /// Key that was rejected
        key: String,
    },

    /// Starting a wizard that is unknown or disabled
    #[error("Wizard not found: {0}")]
    NotFound(String),

    /// The identity provider callback reported a failure
    ///
    /// The execution state is left untouched.
    #[error("Identity provider callback failed: {0}")]
    ProviderCallback(String),

    /// Callback returned a status that is neither a state nor a known error
    #[error("Callback could not be processed: {0}")]
    CallbackFailed(String),

    /// Operation is not permitted for the current state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A submission for the same execution is still pending
    #[error("A transition for execution '{key}' is already in flight")]
    TransitionInFlight {
        /// Key of the busy execution
        key: String,
    },

    /// Generic request failure (network, server error)
    ///
    /// **Recovery**: repeat the identical call; params are unchanged and the
    /// server is authoritative.
    #[error("Request failed: {0}")]
    Request(String),

    /// The server returned a state that breaks the model invariants
    #[error("Invalid response from wizard API: {0}")]
    InvalidResponse(String),

    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] CheckpointError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WizardError {
    /// Build a validation error for a single field
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(path.into(), vec![message.into()]);
        WizardError::Validation(errors)
    }

    /// Whether repeating the identical call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, WizardError::Request(_))
    }

    /// Whether the user has to start the process over
    pub fn requires_restart(&self) -> bool {
        matches!(self, WizardError::ExpiredExecution { .. })
    }

    /// Field errors, when this is a validation failure
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            WizardError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<UtilsError> for WizardError {
    fn from(err: UtilsError) -> Self {
        match err {
            UtilsError::ConfigError(msg) => WizardError::Configuration(msg),
            UtilsError::SerializationError(msg) => WizardError::Serialization(msg),
            other => WizardError::Request(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WizardError {
    fn from(err: serde_json::Error) -> Self {
        WizardError::Serialization(err.to_string())
    }
}
