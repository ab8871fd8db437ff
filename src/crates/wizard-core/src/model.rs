//! Data model of a wizard execution
//!
//! An [`ExecutionState`] is the server's authoritative view of one run of a
//! wizard. The client never patches it: every transition or back response
//! replaces it wholesale. The only client-side mutation is the merge of
//! validated input into [`Params`] right before a transition is sent.
//!
//! # Wire format
//!
//! All types use camelCase JSON. Step descriptors are a tagged union keyed by
//! `kind`:
//!
//! ```json
//! {
//!   "key": "a8f3",
//!   "wizard": { "id": "signup", "kind": "registration", "name": "Sign up" },
//!   "step": { "id": "s1", "name": "Group", "kind": "group",
//!             "groups": [{ "id": "G1", "name": "Consumers" }] },
//!   "params": {},
//!   "transitions": [{ "id": "next", "label": "Next" }],
//!   "action": "step",
//!   "path": []
//! }
//! ```

use crate::error::{Result, WizardError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category of a wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardKind {
    /// Public user registration
    Registration,
    /// System-level wizard run by an administrator
    System,
    /// Wizard run on behalf of a user
    User,
    /// Wizard reachable from a custom menu entry
    Menu,
}

/// Menu placement metadata, consumed by the menu system only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuClassification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Identity of the wizard being executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDescriptor {
    pub id: String,
    pub kind: WizardKind,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<MenuClassification>,
}

/// What the client is expected to do with a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Render the step and let the user pick a transition
    Step,
    /// The step was already executed in this execution; render it again
    AlreadyExecuted,
    /// The execution is over, show the result
    Finish,
    /// Leave the page for an external URL (payment, external service)
    ExternalRedirect,
}

impl Action {
    /// Whether a state with this action may offer transitions
    pub fn allows_transitions(self) -> bool {
        matches!(self, Action::Step | Action::AlreadyExecuted)
    }
}

/// A named edge out of the current step
///
/// The id is opaque: the client never infers the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// Discriminant of [`StepDetail`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Group,
    FormFields,
    IdentityProvider,
    EmailVerification,
    PhoneVerification,
}

/// A group offered for selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// An identity provider the user may log in with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProviderOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Label/value pair of a selection field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

/// Type of a server-declared custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CustomFieldType {
    String,
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    SingleSelection,
    MultiSelection,
    Url,
    Email,
}

/// Declaration of a custom field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDeclaration {
    pub internal_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub possible_values: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Whether a registration field is shown, and if so whether it must be filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldAvailability {
    #[default]
    Disabled,
    Optional,
    Required,
}

impl FieldAvailability {
    pub fn is_enabled(self) -> bool {
        !matches!(self, FieldAvailability::Disabled)
    }

    pub fn is_required(self) -> bool {
        matches!(self, FieldAvailability::Required)
    }
}

/// Address input settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressConfiguration {
    #[serde(default)]
    pub availability: FieldAvailability,
    /// Address fields to show, e.g. `addressLine1`, `city`, `zip`
    #[serde(default)]
    pub fields: Vec<String>,
    /// Subset of `fields` that must be filled once an address is defined
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// A password type the new user has to choose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub only_numeric: bool,
}

/// An agreement the user must accept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Captcha issued for this step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaChallenge {
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Extra input a Registration wizard collects in a form-fields step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFields {
    #[serde(default)]
    pub name: FieldAvailability,
    #[serde(default)]
    pub username: FieldAvailability,
    #[serde(default)]
    pub email: FieldAvailability,
    #[serde(default)]
    pub mobile_phone: FieldAvailability,
    #[serde(default)]
    pub land_line_phone: FieldAvailability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressConfiguration>,
    #[serde(default)]
    pub password_types: Vec<PasswordPolicy>,
    #[serde(default)]
    pub security_questions: Vec<SelectOption>,
    #[serde(default)]
    pub agreements: Vec<Agreement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<CaptchaChallenge>,
    #[serde(default)]
    pub require_email_verification: bool,
    #[serde(default)]
    pub require_sms_verification: bool,
}

/// Payload of a form-fields step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldsStep {
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationFields>,
    /// E-mail already confirmed earlier in this execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_email: Option<String>,
    /// Mobile number already confirmed earlier in this execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_sms: Option<String>,
}

/// Kind-specific step payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepDetail {
    Group {
        #[serde(default)]
        groups: Vec<GroupOption>,
    },
    FormFields(FormFieldsStep),
    IdentityProvider {
        #[serde(default)]
        providers: Vec<IdentityProviderOption>,
    },
    EmailVerification,
    PhoneVerification,
}

/// The step the server currently expects the client to complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub detail: StepDetail,
}

impl StepDescriptor {
    pub fn kind(&self) -> StepKind {
        match self.detail {
            StepDetail::Group { .. } => StepKind::Group,
            StepDetail::FormFields(_) => StepKind::FormFields,
            StepDetail::IdentityProvider { .. } => StepKind::IdentityProvider,
            StepDetail::EmailVerification => StepKind::EmailVerification,
            StepDetail::PhoneVerification => StepKind::PhoneVerification,
        }
    }
}

/// Execution-scoped value bag, resent on every transition
///
/// Values are keyed by namespace (`group`, `user`, `passwords`, ...). The
/// version counts local merges and is not part of the wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Params {
    #[serde(skip)]
    version: u64,
    #[serde(flatten)]
    values: Map<String, Value>,
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of merges applied since this bag was received
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, namespace: &str) -> Option<&Value> {
        self.values.get(namespace)
    }

    /// Look up a dotted path such as `user.name`
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.values.contains_key(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Merge one step's contribution into the bag
    ///
    /// Objects are merged one level deep so values collected by earlier steps
    /// under the same namespace survive; any other value replaces what was
    /// there. Null entries remove the key, and an object left with nothing in
    /// it is not kept.
    pub fn merge(&mut self, contribution: Map<String, Value>) {
        for (namespace, value) in contribution {
            match value {
                Value::Null => {
                    self.values.remove(&namespace);
                }
                Value::Object(incoming) => match self.values.get_mut(&namespace) {
                    Some(Value::Object(existing)) => {
                        for (k, v) in incoming {
                            if v.is_null() {
                                existing.remove(&k);
                            } else {
                                existing.insert(k, v);
                            }
                        }
                    }
                    _ => {
                        let stripped: Map<String, Value> =
                            incoming.into_iter().filter(|(_, v)| !v.is_null()).collect();
                        if stripped.is_empty() {
                            self.values.remove(&namespace);
                        } else {
                            self.values.insert(namespace, Value::Object(stripped));
                        }
                    }
                },
                other => {
                    self.values.insert(namespace, other);
                }
            }
        }
        self.version += 1;
    }

    /// Set a single namespace
    pub fn insert(&mut self, namespace: impl Into<String>, value: Value) {
        let mut contribution = Map::new();
        contribution.insert(namespace.into(), value);
        self.merge(contribution);
    }
}

impl From<Map<String, Value>> for Params {
    fn from(values: Map<String, Value>) -> Self {
        Self { version: 0, values }
    }
}

/// Where an execution stands, following the driver state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Waiting on the user at a step of this kind
    AtStep(StepKind),
    /// Terminal, with the server's result type
    Finished(String),
}

/// One run of a wizard as last reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    /// Opaque resumption token
    pub key: String,
    pub wizard: WizardDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepDescriptor>,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    pub action: Action,
    /// Previously visited step ids; non-empty iff back is available
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ExecutionState {
    /// Reject states that break the model invariants
    ///
    /// Exactly one of `step` and `result_type` is set, and transitions are
    /// only offered for `step`/`alreadyExecuted` actions.
    pub fn check_invariants(&self) -> Result<()> {
        match (&self.step, &self.result_type) {
            (Some(_), Some(_)) => {
                return Err(WizardError::InvalidResponse(format!(
                    "execution '{}' has both a step and a result",
                    self.key
                )))
            }
            (None, None) => {
                return Err(WizardError::InvalidResponse(format!(
                    "execution '{}' has neither a step nor a result",
                    self.key
                )))
            }
            _ => {}
        }
        if !self.transitions.is_empty() && !self.action.allows_transitions() {
            return Err(WizardError::InvalidResponse(format!(
                "execution '{}' offers transitions with action {:?}",
                self.key, self.action
            )));
        }
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        match (&self.step, &self.result_type) {
            (Some(step), _) => Phase::AtStep(step.kind()),
            (None, result_type) => Phase::Finished(result_type.clone().unwrap_or_default()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.step.is_none()
    }

    pub fn can_go_back(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    pub fn is_registration(&self) -> bool {
        self.wizard.kind == WizardKind::Registration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_state() -> Value {
        json!({
            "key": "k1",
            "wizard": {"id": "signup", "kind": "registration", "name": "Sign up"},
            "step": {"id": "s1", "name": "Group", "kind": "group",
                     "groups": [{"id": "G1", "name": "One"}, {"id": "G2", "name": "Two"}]},
            "params": {"foo": 1},
            "transitions": [{"id": "next", "label": "Next"}],
            "action": "step",
            "path": []
        })
    }

    #[test]
    fn test_deserialize_group_step() {
        let state: ExecutionState = serde_json::from_value(group_state()).unwrap();
        assert_eq!(state.wizard.kind, WizardKind::Registration);
        assert_eq!(state.phase(), Phase::AtStep(StepKind::Group));
        assert_eq!(state.params.get("foo"), Some(&json!(1)));
        assert!(!state.can_go_back());
        state.check_invariants().unwrap();

        match state.step.unwrap().detail {
            StepDetail::Group { groups } => assert_eq!(groups[1].id, "G2"),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_form_fields_step() {
        let step: StepDescriptor = serde_json::from_value(json!({
            "id": "s2",
            "kind": "formFields",
            "customFields": [{"internalName": "age", "type": "integer", "required": true}],
            "registration": {"name": "required", "email": "optional", "requireEmailVerification": true},
            "verifiedEmail": "a@b.com"
        }))
        .unwrap();

        assert_eq!(step.kind(), StepKind::FormFields);
        let StepDetail::FormFields(form) = step.detail else {
            panic!("expected form fields");
        };
        assert_eq!(form.custom_fields[0].field_type, CustomFieldType::Integer);
        let registration = form.registration.unwrap();
        assert!(registration.name.is_required());
        assert!(!registration.username.is_enabled());
        assert_eq!(form.verified_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_unit_steps_serialize_with_kind() {
        let step = StepDescriptor {
            id: "v".into(),
            name: String::new(),
            detail: StepDetail::PhoneVerification,
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["kind"], "phoneVerification");
    }

    #[test]
    fn test_finished_state() {
        let state: ExecutionState = serde_json::from_value(json!({
            "key": "k1",
            "wizard": {"id": "signup", "kind": "registration"},
            "action": "finish",
            "resultType": "plainText",
            "result": "Welcome"
        }))
        .unwrap();
        state.check_invariants().unwrap();
        assert_eq!(state.phase(), Phase::Finished("plainText".into()));
        assert!(state.is_finished());
    }

    #[test]
    fn test_invariant_violations() {
        let mut state: ExecutionState = serde_json::from_value(group_state()).unwrap();
        state.result_type = Some("plainText".into());
        assert!(matches!(
            state.check_invariants(),
            Err(WizardError::InvalidResponse(_))
        ));

        state.result_type = None;
        state.action = Action::Finish;
        assert!(state.check_invariants().is_err());

        state.step = None;
        state.transitions.clear();
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_params_merge_is_one_level_deep() {
        let mut params = Params::new();
        params.insert("customValues", json!({"a": 1}));
        params.insert("customValues", json!({"b": 2}));
        params.insert("group", json!("G1"));
        params.insert("group", json!("G2"));

        assert_eq!(params.get("customValues"), Some(&json!({"a": 1, "b": 2})));
        assert_eq!(params.get("group"), Some(&json!("G2")));
        assert_eq!(params.version(), 4);
        assert_eq!(params.pointer("customValues.b"), Some(&json!(2)));
        assert_eq!(params.pointer("customValues.c"), None);
    }

    #[test]
    fn test_params_null_removes() {
        let mut params = Params::new();
        params.insert("user", json!({"name": "Ann", "email": "a@b.com"}));
        params.insert("user", json!({"email": null}));
        params.insert("group", Value::Null);

        assert_eq!(params.get("user"), Some(&json!({"name": "Ann"})));
        assert!(!params.contains("group"));
    }

    #[test]
    fn test_params_equality_ignores_version() {
        let mut a = Params::new();
        a.insert("x", json!(1));
        let b: Params = serde_json::from_value(json!({"x": 1})).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_value(&a).unwrap(), json!({"x": 1}));
    }
}
