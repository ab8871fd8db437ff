//! Wiring the driver components together

use crate::api::{HttpWizardApi, WizardApi};
use crate::config::WizardConfig;
use crate::dispatcher::TransitionDispatcher;
use crate::error::Result;
use crate::form::StepFormAssembler;
use crate::loader::ExecutionLoader;
use crate::marker::ResumableKeyMarker;
use std::sync::Arc;
use tracing::debug;
use utils::config::ValidateConfig;
use wizard_checkpoint::{ExecutionCache, FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};

/// Loader, dispatcher and assembler sharing one API, cache and store
#[derive(Clone)]
pub struct WizardDriver {
    loader: ExecutionLoader,
    dispatcher: TransitionDispatcher,
    assembler: StepFormAssembler,
}

impl WizardDriver {
    /// Assemble a driver around an arbitrary API and durable store
    pub fn new(api: Arc<dyn WizardApi>, store: Arc<dyn KeyValueStore>, config: &WizardConfig) -> Self {
        let marker = ResumableKeyMarker::new(store, config.marker_key.clone());
        let loader = ExecutionLoader::new(Arc::clone(&api), ExecutionCache::new(), marker);
        let dispatcher = TransitionDispatcher::new(api, loader.clone(), config.resume_path.clone());
        Self {
            loader,
            dispatcher,
            assembler: StepFormAssembler::new(),
        }
    }

    /// HTTP API plus a file store when `store_path` is set, memory otherwise
    pub fn from_config(config: &WizardConfig) -> Result<Self> {
        config.validate()?;
        let api: Arc<dyn WizardApi> = Arc::new(HttpWizardApi::from_config(config)?);
        let store: Arc<dyn KeyValueStore> = match &config.store_path {
            Some(path) => {
                debug!(path = %path.display(), "using file store");
                Arc::new(FileKeyValueStore::new(path.clone()))
            }
            None => Arc::new(InMemoryKeyValueStore::new()),
        };
        Ok(Self::new(api, store, config))
    }

    pub fn with_assembler(mut self, assembler: StepFormAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn loader(&self) -> &ExecutionLoader {
        &self.loader
    }

    pub fn dispatcher(&self) -> &TransitionDispatcher {
        &self.dispatcher
    }

    pub fn assembler(&self) -> &StepFormAssembler {
        &self.assembler
    }
}
