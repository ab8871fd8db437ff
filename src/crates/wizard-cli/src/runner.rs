//! Interactive execution of a wizard in the terminal

use crate::prompt::{parse_command, parse_yes_no, Command, HELP};
use anyhow::Result;
use serde_json::Value;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::debug;
use wizard_core::form::FieldKind;
use wizard_core::{
    Action, ExecutionState, Navigation, RedirectMode, StepKind, VerificationMedium, WizardDriver,
    WizardError, WizardSession,
};

/// How an interactive run ended
#[derive(Debug)]
pub enum Outcome {
    Finished(ExecutionState),
    /// Left for an external page
    Suspended { key: String, url: String },
    /// Stopped by the user or at end of input
    Stopped { key: String },
}

fn destination_path(medium: VerificationMedium) -> &'static str {
    match medium {
        VerificationMedium::Email => "user.email",
        VerificationMedium::Sms => "mobilePhone.number",
    }
}

pub struct Runner<'d, R, W> {
    driver: &'d WizardDriver,
    input: Lines<R>,
    out: W,
}

impl<'d, R, W> Runner<'d, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(driver: &'d WizardDriver, input: R, out: W) -> Self {
        Self {
            driver,
            input: input.lines(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        Ok(self.input.next_line().await?)
    }

    /// Drive `state` until it finishes, leaves the application or the user stops
    pub async fn run(&mut self, state: ExecutionState) -> Result<Outcome> {
        let driver = self.driver;
        let mut session = WizardSession::new(state, driver.assembler())?;
        let mut fresh = true;

        loop {
            let state = session.state().clone();
            if state.is_finished() {
                self.print_result(&state)?;
                return Ok(Outcome::Finished(state));
            }
            if state.action == Action::ExternalRedirect {
                let navigation = driver
                    .dispatcher()
                    .external_redirect(&state, RedirectMode::FullPage)
                    .await?;
                return self.leave(&state.key, navigation);
            }
            if fresh {
                self.print_step(&session)?;
                self.fill(&mut session).await?;
                fresh = false;
            }

            let Some(line) = self.ask("> ").await? else {
                return Ok(Outcome::Stopped { key: state.key });
            };
            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    writeln!(self.out, "{}", message)?;
                    continue;
                }
            };
            debug!(key = %state.key, command = ?command, "step command");

            let next = match command {
                Command::Help => {
                    writeln!(self.out, "{}", HELP)?;
                    continue;
                }
                Command::Quit => return Ok(Outcome::Stopped { key: state.key }),
                Command::Edit => {
                    self.fill(&mut session).await?;
                    continue;
                }
                Command::Submit(transition) => {
                    let Some(form) = session.form() else {
                        continue;
                    };
                    driver
                        .dispatcher()
                        .submit(&state, form, transition.as_deref())
                        .await
                }
                Command::Back => driver.dispatcher().back(&state).await,
                Command::SendCode(medium) => {
                    let destination = session
                        .form()
                        .and_then(|f| f.value_of(destination_path(medium)).as_str())
                        .unwrap_or_default()
                        .to_string();
                    match driver
                        .dispatcher()
                        .send_verification_code(&state, medium, &destination)
                        .await
                    {
                        Ok(()) => writeln!(self.out, "Code sent to {}", destination)?,
                        Err(e) => self.report(e)?,
                    }
                    continue;
                }
                Command::Provider(id) => {
                    match driver
                        .dispatcher()
                        .choose_identity_provider(&state, &id, RedirectMode::FullPage)
                        .await
                    {
                        Ok(navigation) => return self.leave(&state.key, navigation),
                        Err(e) => {
                            self.report(e)?;
                            continue;
                        }
                    }
                }
                Command::Redirect => {
                    match driver
                        .dispatcher()
                        .external_redirect(&state, RedirectMode::FullPage)
                        .await
                    {
                        Ok(navigation) => return self.leave(&state.key, navigation),
                        Err(e) => {
                            self.report(e)?;
                            continue;
                        }
                    }
                }
            };

            match next {
                Ok(next) => {
                    session.replace(next, driver.assembler())?;
                    fresh = true;
                }
                Err(e) => self.report(e)?,
            }
        }
    }

    /// Print errors the user can act on; anything else ends the run
    fn report(&mut self, error: WizardError) -> Result<()> {
        if let WizardError::Validation(errors) = &error {
            writeln!(self.out, "Please correct the following:")?;
            for (path, messages) in errors {
                for message in messages {
                    writeln!(self.out, "  {}: {}", path, message)?;
                }
            }
            return Ok(());
        }
        if error.is_retryable() {
            writeln!(self.out, "{} (try again)", error)?;
            return Ok(());
        }
        if matches!(
            error,
            WizardError::IllegalState(_)
                | WizardError::TransitionInFlight { .. }
                | WizardError::ProviderCallback(_)
        ) {
            writeln!(self.out, "{}", error)?;
            return Ok(());
        }
        Err(error.into())
    }

    async fn fill(&mut self, session: &mut WizardSession) -> Result<()> {
        let Some(form) = session.form_mut() else {
            return Ok(());
        };

        let gates: Vec<(String, String, bool)> = form
            .sub_models()
            .filter_map(|m| m.gate().map(|g| (m.id.clone(), g.label.clone(), g.enabled)))
            .collect();
        for (id, label, current) in gates {
            let hint = if current { "Y/n" } else { "y/N" };
            let enabled = loop {
                let Some(answer) = self.ask(&format!("{}? [{}] ", label, hint)).await? else {
                    return Ok(());
                };
                match parse_yes_no(&answer, current) {
                    Some(enabled) => break enabled,
                    None => writeln!(self.out, "answer yes or no")?,
                }
            };
            form.set_gate(&id, enabled)?;
        }

        let paths: Vec<String> = form
            .active_fields()
            .filter(|f| f.kind != FieldKind::Hidden)
            .map(|f| f.path.clone())
            .collect();
        for path in paths {
            loop {
                let Some(field) = form.field(&path) else {
                    break;
                };
                for (i, option) in field.kind.options().iter().enumerate() {
                    writeln!(self.out, "  {}) {}", i + 1, option.label)?;
                }
                let required = if form.is_required(field) { "*" } else { "" };
                let current = form.display_value(&path);
                let prompt = if current.is_empty() {
                    format!("{}{}: ", field.label, required)
                } else {
                    format!("{}{} [{}]: ", field.label, required, current)
                };

                let Some(answer) = self.ask(&prompt).await? else {
                    return Ok(());
                };
                match answer.trim() {
                    "" => break,
                    "-" => {
                        form.set(&path, Value::Null)?;
                        break;
                    }
                    _ => match form.set_input(&path, &answer) {
                        Ok(()) => break,
                        Err(WizardError::Validation(errors)) => {
                            for message in errors.values().flatten() {
                                writeln!(self.out, "  {}", message)?;
                            }
                        }
                        Err(e) => return Err(e.into()),
                    },
                }
            }
        }
        Ok(())
    }

    fn print_step(&mut self, session: &WizardSession) -> Result<()> {
        let state = session.state();
        let title = state
            .step
            .as_ref()
            .map(|s| if s.name.is_empty() { s.id.as_str() } else { s.name.as_str() })
            .unwrap_or_default();
        let wizard = if state.wizard.name.is_empty() {
            state.wizard.id.as_str()
        } else {
            state.wizard.name.as_str()
        };

        writeln!(self.out)?;
        writeln!(self.out, "== {} :: {} ==", wizard, title)?;
        if state.action == Action::AlreadyExecuted {
            writeln!(self.out, "(this step was already completed)")?;
        }
        if let Some(form) = session.form().filter(|f| f.kind() == StepKind::IdentityProvider) {
            for provider in form.providers() {
                writeln!(self.out, "  provider {} ({})", provider.id, provider.name)?;
            }
        }

        let transitions: Vec<String> = state
            .transitions
            .iter()
            .map(|t| {
                if t.label.is_empty() {
                    t.id.clone()
                } else {
                    format!("{} ({})", t.id, t.label)
                }
            })
            .collect();
        if transitions.is_empty() {
            writeln!(self.out, "type 'finish' to submit")?;
        } else {
            writeln!(self.out, "transitions: {}", transitions.join(", "))?;
        }
        if state.can_go_back() {
            writeln!(self.out, "'back' returns to the previous step")?;
        }
        Ok(())
    }

    fn print_result(&mut self, state: &ExecutionState) -> Result<()> {
        writeln!(self.out)?;
        match &state.result {
            Some(Value::String(text)) => writeln!(self.out, "{}", text)?,
            Some(other) => writeln!(self.out, "{}", serde_json::to_string_pretty(other)?)?,
            None => writeln!(
                self.out,
                "Finished ({})",
                state.result_type.as_deref().unwrap_or("no result")
            )?,
        }
        Ok(())
    }

    fn leave(&mut self, key: &str, navigation: Navigation) -> Result<Outcome> {
        match navigation {
            Navigation::Redirect { url, .. } => {
                writeln!(self.out, "Continue at {}", url)?;
                Ok(Outcome::Suspended {
                    key: key.to_string(),
                    url,
                })
            }
            Navigation::ResumeByKey { key, address } => {
                writeln!(self.out, "Resume at {}", address)?;
                Ok(Outcome::Stopped { key })
            }
        }
    }
}
