//! Parsing of interactive commands and command-line values

use wizard_core::VerificationMedium;

/// What the user typed at the step prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `go <transition>` or `finish` (no transition)
    Submit(Option<String>),
    Back,
    /// Re-enter the step's fields
    Edit,
    SendCode(VerificationMedium),
    Provider(String),
    Redirect,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  go <transition>     submit the step through a transition
  finish              submit without a transition
  back                return to the previous step
  edit                fill in the fields again
  code email|sms      send a verification code
  provider <id>       continue with an identity provider
  redirect            leave for the external page
  quit                stop here, resume later by key";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("type 'help' for the list of commands".to_string());
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for '{}'", head));
    }

    let command = match (head.to_lowercase().as_str(), arg) {
        ("go", Some(id)) => Command::Submit(Some(id.to_string())),
        ("go", None) => return Err("usage: go <transition>".to_string()),
        ("finish", None) => Command::Submit(None),
        ("back", None) => Command::Back,
        ("edit", None) => Command::Edit,
        ("code", Some(medium)) => Command::SendCode(parse_medium(medium)?),
        ("provider", Some(id)) => Command::Provider(id.to_string()),
        ("redirect", None) => Command::Redirect,
        ("help" | "?", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        (other, _) => return Err(format!("unknown command '{}'", other)),
    };
    Ok(command)
}

fn parse_medium(text: &str) -> Result<VerificationMedium, String> {
    match text.to_lowercase().as_str() {
        "email" | "e-mail" => Ok(VerificationMedium::Email),
        "sms" | "phone" => Ok(VerificationMedium::Sms),
        other => Err(format!("unknown medium '{}', use email or sms", other)),
    }
}

/// `name=value` pair for `--param`
pub fn parse_key_value(text: &str) -> Result<(String, String), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", text))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing name in '{}'", text));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Yes/no answer; blank keeps `default`
pub fn parse_yes_no(text: &str, default: bool) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
