//! Remote wizard API
//!
//! The server owns the process graph. The driver talks to it through
//! [`WizardApi`]; [`HttpWizardApi`] is the REST implementation, tests plug in
//! scripted doubles.

mod http;

pub use http::HttpWizardApi;

use crate::error::Result;
use crate::model::{ExecutionState, Params, WizardKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which wizard to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSelector {
    pub id: String,
    pub kind: WizardKind,
}

impl WizardSelector {
    pub fn new(id: impl Into<String>, kind: WizardKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn registration(id: impl Into<String>) -> Self {
        Self::new(id, WizardKind::Registration)
    }
}

/// Context sent when starting an execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartContext {
    /// Invitation token received by e-mail, for registrations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,
    /// User the wizard runs on behalf of, for user wizards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Menu entry the wizard was opened from, for menu wizards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
}

/// Channel a verification code is delivered through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationMedium {
    Email,
    Sms,
}

impl fmt::Display for VerificationMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMedium::Email => f.write_str("email"),
            VerificationMedium::Sms => f.write_str("sms"),
        }
    }
}

/// Return-navigation payload captured by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// HTTP method of the return request
    pub method: String,
    /// Query or form parameters of the return request
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl CallbackRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// What the server made of a callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CallbackOutcome {
    /// The execution continues from this state
    Continue { execution: Box<ExecutionState> },
    /// The identity provider reported a failure
    ProviderError {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

/// Operations the wizard server exposes
#[async_trait]
pub trait WizardApi: Send + Sync {
    /// Start a new execution
    async fn start(&self, selector: &WizardSelector, context: &StartContext) -> Result<ExecutionState>;

    /// Fetch an execution by key
    async fn resume(&self, key: &str) -> Result<ExecutionState>;

    /// Go back to the previous step
    async fn back(&self, key: &str) -> Result<ExecutionState>;

    /// Advance through `transition` (or the default path when `None`)
    async fn transition(
        &self,
        key: &str,
        transition: Option<&str>,
        params: &Params,
    ) -> Result<ExecutionState>;

    /// Target URL for an external redirect
    async fn redirect(&self, key: &str, params: &Params) -> Result<String>;

    /// Post the payload captured when navigation returned to the application
    async fn callback(&self, key: &str, request: &CallbackRequest) -> Result<CallbackOutcome>;

    /// Ask the server to deliver a verification code
    async fn send_verification_code(
        &self,
        key: &str,
        medium: VerificationMedium,
        destination: &str,
    ) -> Result<()>;
}
