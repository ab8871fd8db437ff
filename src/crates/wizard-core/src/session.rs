//! Pairing an execution state with its editable form

use crate::error::Result;
use crate::form::{StepForm, StepFormAssembler};
use crate::model::{ExecutionState, Phase};

/// What a presentation layer renders: the current state and, while at a
/// step, the form assembled for it
#[derive(Debug, Clone)]
pub struct WizardSession {
    state: ExecutionState,
    form: Option<StepForm>,
}

impl WizardSession {
    pub fn new(state: ExecutionState, assembler: &StepFormAssembler) -> Result<Self> {
        let form = Self::assemble(&state, assembler)?;
        Ok(Self { state, form })
    }

    fn assemble(state: &ExecutionState, assembler: &StepFormAssembler) -> Result<Option<StepForm>> {
        state
            .step
            .as_ref()
            .map(|step| assembler.assemble(step, state.wizard.kind, &state.params))
            .transpose()
    }

    /// Install the state the server answered with, discarding the old form
    pub fn replace(&mut self, state: ExecutionState, assembler: &StepFormAssembler) -> Result<()> {
        let form = Self::assemble(&state, assembler)?;
        self.state = state;
        self.form = form;
        Ok(())
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn form(&self) -> Option<&StepForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut StepForm> {
        self.form.as_mut()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn key(&self) -> &str {
        &self.state.key
    }
}
