//! Moving an execution forward, backward and out of the application
//!
//! Every operation here replaces the execution state wholesale with the
//! server's response. At most one remote operation runs per execution key; a
//! second one is rejected immediately with
//! [`WizardError::TransitionInFlight`].

use crate::api::{CallbackOutcome, CallbackRequest, VerificationMedium, WizardApi};
use crate::error::{FieldErrors, Result, WizardError};
use crate::form::StepForm;
use crate::loader::ExecutionLoader;
use crate::model::{ExecutionState, StepDetail};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tooling::logging::{redact_json, LogGuard, LogLevel};
use tooling::validation::Validator;
use tracing::{debug, info, warn};

/// How an external page should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Popup,
    FullPage,
}

/// Instruction for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Leave for an external URL
    Redirect { url: String, mode: RedirectMode },
    /// Go to the canonical resume address of an execution
    ResumeByKey { key: String, address: String },
}

/// Marks a key busy until dropped
struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlight {
    fn acquire(keys: &Arc<Mutex<HashSet<String>>>, key: &str) -> Result<Self> {
        if !keys.lock().insert(key.to_string()) {
            warn!(key = %key, "rejected concurrent wizard operation");
            return Err(WizardError::TransitionInFlight {
                key: key.to_string(),
            });
        }
        Ok(Self {
            keys: Arc::clone(keys),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}

/// Submit, back, external redirect and callback handling
#[derive(Clone)]
pub struct TransitionDispatcher {
    api: Arc<dyn WizardApi>,
    loader: ExecutionLoader,
    resume_path: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TransitionDispatcher {
    /// `resume_path` is the address template containing `{key}`
    pub fn new(api: Arc<dyn WizardApi>, loader: ExecutionLoader, resume_path: impl Into<String>) -> Self {
        Self {
            api,
            loader,
            resume_path: resume_path.into(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn loader(&self) -> &ExecutionLoader {
        &self.loader
    }

    /// Whether a remote operation is pending for `key`
    pub fn is_busy(&self, key: &str) -> bool {
        self.in_flight.lock().contains(key)
    }

    fn resume_address(&self, key: &str) -> String {
        self.resume_path.replace(crate::config::KEY_PLACEHOLDER, key)
    }

    /// Validate the step, merge its values and advance
    ///
    /// Nothing is sent when validation fails. `transition` must be one of the
    /// state's transitions; `None` asks the server for its default path and,
    /// for registrations, marks the submission as terminal.
    pub async fn submit(
        &self,
        state: &ExecutionState,
        form: &StepForm,
        transition: Option<&str>,
    ) -> Result<ExecutionState> {
        let _in_flight = InFlight::acquire(&self.in_flight, &state.key)?;

        let step = state.step.as_ref().ok_or_else(|| {
            WizardError::IllegalState(format!("execution '{}' is finished", state.key))
        })?;
        if form.step_id() != step.id {
            return Err(WizardError::IllegalState(format!(
                "form belongs to step '{}', execution is at '{}'",
                form.step_id(),
                step.id
            )));
        }
        if let Some(id) = transition {
            if state.transition(id).is_none() {
                return Err(WizardError::IllegalState(format!(
                    "transition '{}' is not offered at step '{}'",
                    id, step.id
                )));
            }
        }

        let contribution = form.validate().await.map_err(|errors| {
            debug!(key = %state.key, fields = errors.len(), "step did not validate");
            WizardError::Validation(errors)
        })?;

        let mut params = state.params.clone();
        params.merge(contribution);
        let redacted = redact_json(&Value::Object(params.as_map().clone()));
        debug!(
            key = %state.key,
            step = %step.id,
            transition = ?transition,
            params = %redacted,
            "submitting step"
        );

        let _guard = LogGuard::new(format!("wizard.transition {}", state.key));
        let next = self.api.transition(&state.key, transition, &params).await?;
        next.check_invariants()?;

        if state.is_registration() {
            let remembered = match transition {
                Some(_) => self.loader.marker().set(&next.key).await,
                None => self.loader.marker().clear().await,
            };
            if let Err(error) = remembered {
                warn!(key = %next.key, error = %error, "resumable registration marker not updated");
            }
        }

        info!(key = %next.key, action = ?next.action, "transition applied");
        Ok(next)
    }

    /// Return to the previous step
    pub async fn back(&self, state: &ExecutionState) -> Result<ExecutionState> {
        let _in_flight = InFlight::acquire(&self.in_flight, &state.key)?;
        if !state.can_go_back() {
            return Err(WizardError::IllegalState(format!(
                "execution '{}' has no previous step",
                state.key
            )));
        }

        let _guard = LogGuard::new(format!("wizard.back {}", state.key));
        let previous = self.api.back(&state.key).await?;
        previous.check_invariants()?;
        Ok(previous)
    }

    /// Suspend the execution and hand out the external URL to navigate to
    pub async fn external_redirect(&self, state: &ExecutionState, mode: RedirectMode) -> Result<Navigation> {
        let _in_flight = InFlight::acquire(&self.in_flight, &state.key)?;
        self.redirect_unguarded(state, mode).await
    }

    async fn redirect_unguarded(&self, state: &ExecutionState, mode: RedirectMode) -> Result<Navigation> {
        let _guard = LogGuard::with_level(format!("wizard.redirect {}", state.key), LogLevel::Info);
        let url = self.api.redirect(&state.key, &state.params).await?;
        self.suspend(state).await;
        info!(key = %state.key, mode = ?mode, "leaving for external redirect");
        Ok(Navigation::Redirect { url, mode })
    }

    /// Cache `state` once the server has already accepted the operation
    ///
    /// A failing durable store is logged; the caller still gets the outcome.
    async fn suspend(&self, state: &ExecutionState) {
        if let Err(error) = self.loader.cache_and_store(state).await {
            warn!(key = %state.key, error = %error, "resumable registration marker not written");
        }
    }

    /// Pick an identity provider at an identity-provider step
    ///
    /// Records the choice in params and redirects right away; there is
    /// nothing to validate.
    pub async fn choose_identity_provider(
        &self,
        state: &ExecutionState,
        provider: &str,
        mode: RedirectMode,
    ) -> Result<Navigation> {
        let _in_flight = InFlight::acquire(&self.in_flight, &state.key)?;
        let offered = match state.step.as_ref().map(|s| &s.detail) {
            Some(StepDetail::IdentityProvider { providers }) => {
                providers.iter().any(|p| p.id == provider)
            }
            _ => {
                return Err(WizardError::IllegalState(format!(
                    "execution '{}' is not at an identity provider step",
                    state.key
                )))
            }
        };
        if !offered {
            return Err(WizardError::IllegalState(format!(
                "identity provider '{}' is not offered",
                provider
            )));
        }

        let mut suspended = state.clone();
        suspended
            .params
            .insert("identityProvider", Value::String(provider.to_string()));
        self.redirect_unguarded(&suspended, mode).await
    }

    /// Continue after the external page sent the user back
    ///
    /// The fresh state is cached and the caller is sent to the canonical
    /// resume address instead of rendering the callback response, so a
    /// refresh does not post the callback again.
    pub async fn resume_from_callback(&self, key: &str, payload: &CallbackRequest) -> Result<Navigation> {
        let _in_flight = InFlight::acquire(&self.in_flight, key)?;
        let _guard = LogGuard::new(format!("wizard.callback {}", key));

        match self.api.callback(key, payload).await? {
            CallbackOutcome::Continue { execution } => {
                execution.check_invariants()?;
                self.suspend(&execution).await;
                let key = execution.key.clone();
                Ok(Navigation::ResumeByKey {
                    address: self.resume_address(&key),
                    key,
                })
            }
            CallbackOutcome::ProviderError { message } => {
                let message = message.unwrap_or_else(|| "identity provider error".to_string());
                warn!(key = %key, message = %message, "provider callback failed");
                Err(WizardError::ProviderCallback(message))
            }
            CallbackOutcome::Unrecognized => Err(WizardError::CallbackFailed(format!(
                "unrecognized callback status for execution '{}'",
                key
            ))),
        }
    }

    /// Ask the server to deliver a verification code to `destination`
    pub async fn send_verification_code(
        &self,
        state: &ExecutionState,
        medium: VerificationMedium,
        destination: &str,
    ) -> Result<()> {
        let _in_flight = InFlight::acquire(&self.in_flight, &state.key)?;
        if state.is_finished() {
            return Err(WizardError::IllegalState(format!(
                "execution '{}' is finished",
                state.key
            )));
        }
        let destination = destination.trim();
        let (path, label) = match medium {
            VerificationMedium::Email => ("user.email", "E-mail"),
            VerificationMedium::Sms => ("mobilePhone.number", "Mobile phone"),
        };
        let value = Value::String(destination.to_string());
        let mut validator = Validator::new(&value, label).required();
        if medium == VerificationMedium::Email {
            validator = validator.email();
        }
        if let Err(messages) = validator.validate_all() {
            return Err(WizardError::Validation(FieldErrors::from([(
                path.to_string(),
                messages,
            )])));
        }

        self.api
            .send_verification_code(&state.key, medium, destination)
            .await?;
        info!(key = %state.key, medium = %medium, "verification code requested");
        Ok(())
    }
}
