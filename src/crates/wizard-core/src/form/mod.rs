//! Validatable input model of a step
//!
//! A [`StepForm`] is a keyed bag of [`SubModel`]s. Each sub-model owns the
//! fields of one params namespace and knows how its values land in
//! [`Params`](crate::model::Params):
//!
//! | Target              | Example namespace    | Contribution               |
//! |---------------------|----------------------|----------------------------|
//! | [`MergeTarget::Scalar`]    | `group`       | the single field's value   |
//! | [`MergeTarget::Object`]    | `user`        | object of filled fields    |
//! | [`MergeTarget::ListEntry`] | `passwords`   | one array element          |
//!
//! Validation runs in two phases: synchronous rules over every active field,
//! then (only when none failed) the asynchronous rules registered on the
//! assembler.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use wizard_core::form::{FieldKind, FormField, StepForm, SubModel, Validity};
//! use wizard_core::model::StepKind;
//!
//! let mut form = StepForm::detached("s1", StepKind::EmailVerification);
//! form.push(SubModel::scalar(
//!     "emailVerification",
//!     FormField::new("emailVerification", "Code", FieldKind::Code).required(true),
//! ));
//!
//! assert!(matches!(form.check(), Validity::Invalid(_)));
//! form.set("emailVerification", json!("123456")).unwrap();
//! assert_eq!(form.check(), Validity::Valid);
//! ```

mod assembler;
mod codec;

pub use assembler::StepFormAssembler;
pub use codec::{CustomFieldCodec, DefaultCustomFieldCodec, FieldSpec};

use crate::error::{FieldErrors, Result, WizardError};
use crate::model::{IdentityProviderOption, SelectOption, StepKind};
use futures::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tooling::logging::timed;
use tooling::validation::{is_blank, Rule, RuleSet, ValidationRule};
use tracing::debug;

static NULL: Value = Value::Null;

/// Input widget semantics of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    MultilineText,
    Password,
    Integer,
    Decimal,
    Boolean,
    /// ISO `YYYY-MM-DD`
    Date,
    Select(Vec<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    Url,
    Email,
    Phone,
    /// One-time verification code
    Code,
    Captcha,
    /// Fixed value supplied by the server, never edited
    Hidden,
}

impl FieldKind {
    /// Whether values of this kind must never be prefilled or echoed
    pub fn is_secret(&self) -> bool {
        matches!(self, FieldKind::Password | FieldKind::Code | FieldKind::Captcha)
    }

    pub fn options(&self) -> &[SelectOption] {
        match self {
            FieldKind::Select(options) | FieldKind::MultiSelect(options) => options,
            _ => &[],
        }
    }
}

/// When a field must be filled in
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Optional,
    Required,
    /// Required while the field at `source` is filled and differs from the
    /// value the server already marked as verified
    UnlessVerified {
        source: String,
        verified: Option<String>,
    },
}

type AsyncCheck = Arc<dyn Fn(Value) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Asynchronous rule (e.g. username availability)
///
/// Resolves to `Some(message)` when the value is invalid.
#[derive(Clone)]
pub struct AsyncRule(AsyncCheck);

impl AsyncRule {
    pub fn new<F, Fut>(check: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self(Arc::new(move |value| check(value).boxed()))
    }

    fn run(&self, value: Value) -> BoxFuture<'static, Option<String>> {
        (self.0)(value)
    }
}

impl fmt::Debug for AsyncRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncRule")
    }
}

/// A single input
#[derive(Debug, Clone)]
pub struct FormField {
    /// Address of the field within the form, e.g. `user.name`
    pub path: String,
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub requirement: Requirement,
    pub rules: RuleSet,
    /// Path of a field this one has to equal (password confirmation)
    pub must_match: Option<String>,
    pub value: Value,
    async_rules: Vec<AsyncRule>,
}

impl FormField {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            label: label.into(),
            kind,
            requirement: Requirement::Optional,
            rules: RuleSet::new(),
            must_match: None,
            value: Value::Null,
            async_rules: Vec::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.requirement = if required {
            Requirement::Required
        } else {
            Requirement::Optional
        };
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn matching(mut self, path: impl Into<String>) -> Self {
        self.must_match = Some(path.into());
        self
    }

    pub fn with_async_rule(mut self, rule: AsyncRule) -> Self {
        self.async_rules.push(rule);
        self
    }

    pub fn has_async_rules(&self) -> bool {
        !self.async_rules.is_empty()
    }
}

/// How a sub-model's values are written into params
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTarget {
    Scalar,
    Object,
    ListEntry,
}

/// Toggle deciding whether a sub-model takes part at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    pub label: String,
    pub enabled: bool,
}

/// Fields belonging to one params namespace
#[derive(Debug, Clone)]
pub struct SubModel {
    pub id: String,
    pub namespace: String,
    pub target: MergeTarget,
    gate: Option<Gate>,
    fields: IndexMap<String, FormField>,
}

impl SubModel {
    /// Sub-model holding a single value written directly under `namespace`
    pub fn scalar(namespace: impl Into<String>, field: FormField) -> Self {
        let namespace = namespace.into();
        let mut model = Self {
            id: namespace.clone(),
            namespace,
            target: MergeTarget::Scalar,
            gate: None,
            fields: IndexMap::new(),
        };
        model.insert(field);
        model
    }

    /// Sub-model written as an object under `namespace`
    pub fn object(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            id: namespace.clone(),
            namespace,
            target: MergeTarget::Object,
            gate: None,
            fields: IndexMap::new(),
        }
    }

    /// Sub-model appended as one element of the array under `namespace`
    pub fn list_entry(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            target: MergeTarget::ListEntry,
            gate: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, field: FormField) -> Self {
        self.insert(field);
        self
    }

    pub fn with_gate(mut self, label: impl Into<String>, enabled: bool) -> Self {
        self.gate = Some(Gate {
            label: label.into(),
            enabled,
        });
        self
    }

    fn insert(&mut self, mut field: FormField) {
        field.path = match self.target {
            MergeTarget::Scalar => self.id.clone(),
            _ => format!("{}.{}", self.id, field.name),
        };
        self.fields.insert(field.name.clone(), field);
    }

    pub fn gate(&self) -> Option<&Gate> {
        self.gate.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.as_ref().map_or(true, |g| g.enabled)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.values()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// What this sub-model writes into params
    ///
    /// Blank fields come out as null, which removes a value kept in params
    /// from an earlier visit to the step.
    fn contribution(&self) -> Option<Value> {
        match self.target {
            MergeTarget::Scalar => self.fields.values().next().map(|f| {
                if is_blank(&f.value) {
                    Value::Null
                } else {
                    f.value.clone()
                }
            }),
            MergeTarget::Object => {
                let touched = self.is_touched();
                let mut object = Map::new();
                for field in self.fields.values() {
                    if !is_blank(&field.value) {
                        if touched {
                            object.insert(field.name.clone(), field.value.clone());
                        }
                    } else if field.kind != FieldKind::Hidden {
                        object.insert(field.name.clone(), Value::Null);
                    }
                }
                (!object.is_empty()).then_some(Value::Object(object))
            }
            MergeTarget::ListEntry => {
                if !self.is_touched() {
                    return None;
                }
                let object: Map<String, Value> = self
                    .fields
                    .values()
                    .filter(|f| !is_blank(&f.value))
                    .map(|f| (f.name.clone(), f.value.clone()))
                    .collect();
                Some(Value::Object(object))
            }
        }
    }

    fn is_touched(&self) -> bool {
        self.fields
            .values()
            .any(|f| f.kind != FieldKind::Hidden && !is_blank(&f.value))
    }
}

/// Outcome of the synchronous validation pass
#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    Valid,
    Invalid(FieldErrors),
    /// Synchronous rules passed; this many asynchronous checks remain
    Pending(usize),
}

/// Editable, validatable model of the current step
#[derive(Debug, Clone)]
pub struct StepForm {
    step_id: String,
    kind: StepKind,
    sub_models: IndexMap<String, SubModel>,
    providers: Vec<IdentityProviderOption>,
    codec: Arc<dyn CustomFieldCodec>,
}

impl StepForm {
    pub(crate) fn new(
        step_id: impl Into<String>,
        kind: StepKind,
        codec: Arc<dyn CustomFieldCodec>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            kind,
            sub_models: IndexMap::new(),
            providers: Vec::new(),
            codec,
        }
    }

    /// Empty form using the default codec, for hand-built models
    pub fn detached(step_id: impl Into<String>, kind: StepKind) -> Self {
        Self::new(step_id, kind, Arc::new(DefaultCustomFieldCodec))
    }

    pub fn push(&mut self, sub_model: SubModel) {
        self.sub_models.insert(sub_model.id.clone(), sub_model);
    }

    pub(crate) fn set_providers(&mut self, providers: Vec<IdentityProviderOption>) {
        self.providers = providers;
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn providers(&self) -> &[IdentityProviderOption] {
        &self.providers
    }

    pub fn sub_models(&self) -> impl Iterator<Item = &SubModel> {
        self.sub_models.values()
    }

    pub fn sub_model(&self, id: &str) -> Option<&SubModel> {
        self.sub_models.get(id)
    }

    /// Fields of enabled sub-models, in declaration order
    pub fn active_fields(&self) -> impl Iterator<Item = &FormField> {
        self.sub_models
            .values()
            .filter(|m| m.is_enabled())
            .flat_map(|m| m.fields())
    }

    pub fn field(&self, path: &str) -> Option<&FormField> {
        self.sub_models
            .values()
            .flat_map(|m| m.fields())
            .find(|f| f.path == path)
    }

    fn field_mut(&mut self, path: &str) -> Result<&mut FormField> {
        self.sub_models
            .values_mut()
            .flat_map(|m| m.fields.values_mut())
            .find(|f| f.path == path)
            .ok_or_else(|| WizardError::IllegalState(format!("unknown field '{}'", path)))
    }

    /// Set a field value
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let field = self.field_mut(path)?;
        if field.kind == FieldKind::Hidden {
            return Err(WizardError::IllegalState(format!(
                "field '{}' is not editable",
                path
            )));
        }
        field.value = value;
        Ok(())
    }

    /// Set a field from raw text, converted through the codec
    pub fn set_input(&mut self, path: &str, raw: &str) -> Result<()> {
        let kind = self
            .field(path)
            .map(|f| f.kind.clone())
            .ok_or_else(|| WizardError::IllegalState(format!("unknown field '{}'", path)))?;
        let value = self
            .codec
            .parse(&kind, raw)
            .map_err(|message| WizardError::field(path, message))?;
        self.set(path, value)
    }

    /// Turn a gated sub-model on or off
    pub fn set_gate(&mut self, sub_model: &str, enabled: bool) -> Result<()> {
        let model = self
            .sub_models
            .get_mut(sub_model)
            .ok_or_else(|| WizardError::IllegalState(format!("unknown sub-model '{}'", sub_model)))?;
        match model.gate.as_mut() {
            Some(gate) => {
                gate.enabled = enabled;
                Ok(())
            }
            None => Err(WizardError::IllegalState(format!(
                "sub-model '{}' has no toggle",
                sub_model
            ))),
        }
    }

    /// Current value at `path`; null when absent or gated off
    pub fn value_of(&self, path: &str) -> &Value {
        self.sub_models
            .values()
            .filter(|m| m.is_enabled())
            .flat_map(|m| m.fields())
            .find(|f| f.path == path)
            .map_or(&NULL, |f| &f.value)
    }

    /// Value at `path` rendered by the codec, secrets masked
    pub fn display_value(&self, path: &str) -> String {
        self.field(path)
            .map(|f| self.codec.format(&f.kind, &f.value))
            .unwrap_or_default()
    }

    /// Whether the field must be filled given the rest of the form
    pub fn is_required(&self, field: &FormField) -> bool {
        match &field.requirement {
            Requirement::Optional => false,
            Requirement::Required => true,
            Requirement::UnlessVerified { source, verified } => {
                let current = match self.value_of(source) {
                    Value::String(s) => s.trim().to_string(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                !current.is_empty()
                    && verified.as_deref().map(str::trim) != Some(current.as_str())
            }
        }
    }

    fn sync_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in self.active_fields().filter(|f| f.kind != FieldKind::Hidden) {
            let mut messages = Vec::new();
            if self.is_required(field) {
                if let Err(message) = Rule::Required.validate(&field.value, &field.label) {
                    messages.push(message);
                }
            }
            messages.extend(field.rules.check(&field.value, &field.label));
            if let Some(other) = &field.must_match {
                if !is_blank(&field.value) && &field.value != self.value_of(other) {
                    messages.push(format!("{} does not match", field.label));
                }
            }
            if !messages.is_empty() {
                errors.insert(field.path.clone(), messages);
            }
        }
        errors
    }

    fn pending(&self) -> impl Iterator<Item = &FormField> {
        self.active_fields()
            .filter(|f| f.has_async_rules() && !is_blank(&f.value))
    }

    /// Synchronous pass only
    pub fn check(&self) -> Validity {
        let errors = self.sync_errors();
        if !errors.is_empty() {
            return Validity::Invalid(errors);
        }
        match self.pending().map(|f| f.async_rules.len()).sum() {
            0 => Validity::Valid,
            n => Validity::Pending(n),
        }
    }

    /// Full composite validation
    ///
    /// Asynchronous rules are only awaited when every synchronous rule passed.
    /// On success, returns the contribution to merge into params.
    pub async fn validate(&self) -> std::result::Result<Map<String, Value>, FieldErrors> {
        let errors = self.sync_errors();
        if !errors.is_empty() {
            return Err(errors);
        }

        let checks: Vec<_> = self
            .pending()
            .flat_map(|f| {
                f.async_rules
                    .iter()
                    .map(move |rule| (f.path.clone(), rule.run(f.value.clone())))
            })
            .collect();
        if !checks.is_empty() {
            debug!(step = %self.step_id, pending = checks.len(), "awaiting async rules");
        }

        let (paths, futures): (Vec<_>, Vec<_>) = checks.into_iter().unzip();
        let mut errors = FieldErrors::new();
        for (path, outcome) in paths.into_iter().zip(timed("wizard.async_rules", join_all(futures)).await) {
            if let Some(message) = outcome {
                errors.entry(path).or_default().push(message);
            }
        }

        if errors.is_empty() {
            Ok(self.contribution())
        } else {
            Err(errors)
        }
    }

    /// Changes this step makes to params, keyed by namespace
    ///
    /// A null value clears the namespace or field it names; a sub-model
    /// switched off by its toggle clears its whole namespace.
    pub fn contribution(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for model in self.sub_models.values() {
            if !model.is_enabled() {
                if model.target != MergeTarget::ListEntry {
                    out.insert(model.namespace.clone(), Value::Null);
                }
                continue;
            }
            let Some(value) = model.contribution() else {
                continue;
            };
            match model.target {
                MergeTarget::ListEntry => {
                    let entry = out
                        .entry(model.namespace.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(items) = entry {
                        items.push(value);
                    }
                }
                _ => {
                    out.insert(model.namespace.clone(), value);
                }
            }
        }
        out
    }
}
