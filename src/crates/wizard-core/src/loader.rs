//! Obtaining the first state of an execution
//!
//! Three ways in: start a new execution, resume one by key, or open a
//! navigation request that may carry either. Resuming checks the process
//! cache first; a cache hit is consumed and costs no network request.

use crate::api::{StartContext, WizardApi, WizardSelector};
use crate::error::{Result, WizardError};
use crate::marker::ResumableKeyMarker;
use crate::model::{ExecutionState, WizardKind};
use chrono::Duration;
use std::sync::Arc;
use tooling::logging::LogGuard;
use tracing::{debug, info, warn};
use wizard_checkpoint::ExecutionCache;

/// A navigation request as it reaches the wizard page
#[derive(Debug, Clone, Default)]
pub struct OpenRequest {
    /// Explicit execution key in the address
    pub key: Option<String>,
    /// Wizard to start when there is nothing to resume
    pub selector: Option<WizardSelector>,
    pub context: StartContext,
}

impl OpenRequest {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn wizard(selector: WizardSelector) -> Self {
        Self {
            selector: Some(selector),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: StartContext) -> Self {
        self.context = context;
        self
    }
}

/// Start, resume and suspend operations
#[derive(Clone)]
pub struct ExecutionLoader {
    api: Arc<dyn WizardApi>,
    cache: ExecutionCache<ExecutionState>,
    marker: ResumableKeyMarker,
}

impl ExecutionLoader {
    pub fn new(
        api: Arc<dyn WizardApi>,
        cache: ExecutionCache<ExecutionState>,
        marker: ResumableKeyMarker,
    ) -> Self {
        Self { api, cache, marker }
    }

    pub fn cache(&self) -> &ExecutionCache<ExecutionState> {
        &self.cache
    }

    pub fn marker(&self) -> &ResumableKeyMarker {
        &self.marker
    }

    /// Start a new execution
    ///
    /// Fails with [`WizardError::NotFound`] for an unknown or disabled wizard.
    pub async fn start(&self, selector: &WizardSelector, context: &StartContext) -> Result<ExecutionState> {
        let _guard = LogGuard::new(format!("wizard.start {}", selector.id));
        let state = self.api.start(selector, context).await?;
        state.check_invariants()?;
        info!(wizard = %selector.id, key = %state.key, "wizard execution started");
        Ok(state)
    }

    /// Resume an execution by key
    ///
    /// A cached state is consumed and returned without a network request;
    /// otherwise the server is asked. An unknown key fails with
    /// [`WizardError::ExpiredExecution`].
    pub async fn resume(&self, key: &str) -> Result<ExecutionState> {
        if let Some(state) = self.cache.take(key).await {
            debug!(key = %key, "resumed from cache");
            return Ok(state);
        }

        let _guard = LogGuard::new(format!("wizard.resume {}", key));
        let state = self.api.resume(key).await?;
        state.check_invariants()?;
        Ok(state)
    }

    /// Keep `state` for the way back before leaving the application
    ///
    /// For Registration wizards the key is also written to the durable marker.
    pub async fn cache_and_store(&self, state: &ExecutionState) -> Result<()> {
        self.cache.store(state.key.clone(), state.clone()).await;
        if state.is_registration() {
            self.marker.set(&state.key).await?;
        }
        debug!(key = %state.key, "execution suspended");
        Ok(())
    }

    /// Resolve a navigation request
    ///
    /// An explicit key always wins. Without one, a Registration selector
    /// resumes the remembered registration when there is one; if the server
    /// no longer knows that key the marker is dropped and a new execution is
    /// started.
    pub async fn open(&self, request: &OpenRequest) -> Result<ExecutionState> {
        if let Some(key) = &request.key {
            return self.resume(key).await;
        }

        let selector = request.selector.as_ref().ok_or_else(|| {
            WizardError::IllegalState("open request carries neither a key nor a wizard".to_string())
        })?;

        if selector.kind == WizardKind::Registration {
            if let Some(key) = self.marker.get().await? {
                match self.resume(&key).await {
                    Ok(state) if state.wizard.id == selector.id => {
                        info!(key = %key, "continuing remembered registration");
                        return Ok(state);
                    }
                    Ok(state) => {
                        debug!(key = %key, wizard = %state.wizard.id, "remembered key belongs to another wizard");
                        self.marker.clear().await?;
                    }
                    Err(WizardError::ExpiredExecution { .. }) => {
                        warn!(key = %key, "remembered registration expired, starting over");
                        self.marker.clear().await?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.start(selector, &request.context).await
    }

    /// Drop cached states nobody came back for
    pub async fn purge_stale(&self, max_age: Duration) -> usize {
        let purged = self.cache.purge_older_than(max_age).await;
        if purged > 0 {
            debug!(purged, "purged stale cached executions");
        }
        purged
    }
}
