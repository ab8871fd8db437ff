//! # wizard-core - Client-Side Wizard Execution Driver
//!
//! Drives multi-step wizards (user registration, system, user and menu
//! wizards) whose process graph lives on the server. The client mirrors the
//! server's state machine, assembles and validates the input of each step, and
//! survives leaving the application (identity-provider logins, external
//! payments) without losing progress.
//!
//! ## Core Concepts
//!
//! ### 1. ExecutionState
//!
//! [`ExecutionState`] is the server's authoritative snapshot of one run. It
//! is never patched locally: each transition or back response replaces it.
//! Exactly one of `step` and `result_type` is set.
//!
//! ### 2. StepFormAssembler
//!
//! [`StepFormAssembler`] turns the current step into a [`StepForm`]: a bag of
//! sub-models, one per params namespace, with synchronous rules and optional
//! asynchronous ones. Registration wizards get profile, phone, address,
//! password, agreement, captcha and verification-code sub-models, each gated
//! by server-declared availability.
//!
//! ### 3. ExecutionLoader
//!
//! [`ExecutionLoader`] starts and resumes executions. Before the user leaves
//! the application, `cache_and_store` keeps the state in a consume-once
//! process cache (and, for registrations, writes a durable marker). Resuming
//! a cached key costs no network request.
//!
//! ### 4. TransitionDispatcher
//!
//! [`TransitionDispatcher`] validates, merges into params and submits, goes
//! back, and handles the external-redirect / callback pair. One remote
//! operation per execution at a time.
//!
//! ## State Machine
//!
//! ```text
//!            start / resume / callback-resume
//! Loading ─────────────────────────────────────▶ AtStep(kind)
//!                                                 │   ▲   │
//!                                   submit (step) │   │   │ back
//!                                                 └───┘◀──┘
//!                                                 │
//!                         submit (no step, result)│
//!                                                 ▼
//!                                          Finished(resultType)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wizard_core::{OpenRequest, WizardConfig, WizardDriver, WizardSelector, WizardSession};
//!
//! # async fn run() -> wizard_core::Result<()> {
//! let config = WizardConfig::new("https://bank.example/api");
//! let driver = WizardDriver::from_config(&config)?;
//!
//! let request = OpenRequest::wizard(WizardSelector::registration("signup"));
//! let state = driver.loader().open(&request).await?;
//! let mut session = WizardSession::new(state, driver.assembler())?;
//!
//! while let Some(form) = session.form_mut() {
//!     form.set_input("user.name", "Ann")?;
//!     let form = form.clone();
//!     let next = driver.dispatcher().submit(session.state(), &form, None).await?;
//!     session.replace(next, driver.assembler())?;
//! }
//! println!("{:?}", session.state().result);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod form;
pub mod loader;
pub mod marker;
pub mod model;
pub mod session;

pub use api::{
    CallbackOutcome, CallbackRequest, HttpWizardApi, StartContext, VerificationMedium, WizardApi,
    WizardSelector,
};
pub use config::{Credentials, WizardConfig};
pub use dispatcher::{Navigation, RedirectMode, TransitionDispatcher};
pub use driver::WizardDriver;
pub use error::{FieldErrors, Result, WizardError};
pub use form::{StepForm, StepFormAssembler, Validity};
pub use loader::{ExecutionLoader, OpenRequest};
pub use marker::ResumableKeyMarker;
pub use model::{
    Action, ExecutionState, Params, Phase, StepDescriptor, StepDetail, StepKind, Transition,
    WizardDescriptor, WizardKind,
};
pub use session::WizardSession;
