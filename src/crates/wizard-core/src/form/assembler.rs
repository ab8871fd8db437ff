//! Building a [`StepForm`] from a step descriptor

use super::{
    AsyncRule, CustomFieldCodec, DefaultCustomFieldCodec, FieldKind, FormField, Requirement,
    StepForm, SubModel,
};
use crate::error::{Result, WizardError};
use crate::model::{
    FieldAvailability, FormFieldsStep, GroupOption, Params, RegistrationFields, SelectOption,
    StepDescriptor, StepDetail, WizardKind,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tooling::validation::{is_blank, Rule};
use tracing::debug;

/// Produces the validatable model for whatever step the server sent
///
/// One assembly routine per [`StepDetail`] variant. Values already present in
/// the execution params are used to prefill non-secret fields, so going back
/// to a step shows what was entered before.
///
/// ```rust
/// use wizard_core::form::{AsyncRule, StepFormAssembler};
///
/// let assembler = StepFormAssembler::new().with_async_rule(
///     "user.username",
///     AsyncRule::new(|value| async move {
///         (value == "admin").then(|| "Username is not available".to_string())
///     }),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StepFormAssembler {
    codec: Arc<dyn CustomFieldCodec>,
    async_rules: HashMap<String, Vec<AsyncRule>>,
}

impl Default for StepFormAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StepFormAssembler {
    pub fn new() -> Self {
        Self {
            codec: Arc::new(DefaultCustomFieldCodec),
            async_rules: HashMap::new(),
        }
    }

    /// Use a different custom field codec
    pub fn with_codec(mut self, codec: Arc<dyn CustomFieldCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Attach an asynchronous rule to every field assembled at `path`
    pub fn with_async_rule(mut self, path: impl Into<String>, rule: AsyncRule) -> Self {
        self.async_rules.entry(path.into()).or_default().push(rule);
        self
    }

    pub fn codec(&self) -> &Arc<dyn CustomFieldCodec> {
        &self.codec
    }

    /// Assemble the form for `step` of a wizard of `wizard_kind`
    pub fn assemble(
        &self,
        step: &StepDescriptor,
        wizard_kind: WizardKind,
        params: &Params,
    ) -> Result<StepForm> {
        let mut form = StepForm::new(step.id.clone(), step.kind(), Arc::clone(&self.codec));

        match &step.detail {
            StepDetail::Group { groups } => form.push(group_model(groups, params)?),
            StepDetail::FormFields(fields) => {
                self.form_fields(&mut form, fields, wizard_kind)?;
            }
            StepDetail::IdentityProvider { providers } => {
                form.set_providers(providers.clone());
            }
            StepDetail::EmailVerification => form.push(code_model("emailVerification", "E-mail code")),
            StepDetail::PhoneVerification => form.push(code_model("smsVerification", "SMS code")),
        }

        for model in form.sub_models.values_mut() {
            if let Some(gate) = model.gate.as_mut() {
                if params.get(&model.namespace).is_some_and(|v| !is_blank(v)) {
                    gate.enabled = true;
                }
            }
            for field in model.fields.values_mut() {
                if field.kind.is_secret() || field.kind == FieldKind::Hidden {
                    continue;
                }
                if let Some(previous) = params.pointer(&field.path) {
                    if !is_blank(previous) {
                        field.value = previous.clone();
                    }
                }
                if let Some(rules) = self.async_rules.get(&field.path) {
                    field.async_rules.extend(rules.iter().cloned());
                }
            }
        }

        debug!(
            step = %step.id,
            kind = ?step.kind(),
            sub_models = form.sub_models().count(),
            "assembled step form"
        );
        Ok(form)
    }

    fn form_fields(
        &self,
        form: &mut StepForm,
        step: &FormFieldsStep,
        wizard_kind: WizardKind,
    ) -> Result<()> {
        if !step.custom_fields.is_empty() {
            let mut custom = SubModel::object("customValues");
            for declaration in &step.custom_fields {
                let spec = self.codec.describe(declaration)?;
                let label = if declaration.name.is_empty() {
                    declaration.internal_name.clone()
                } else {
                    declaration.name.clone()
                };
                custom = custom.with_field(
                    FormField::new(declaration.internal_name.clone(), label, spec.kind)
                        .required(spec.required)
                        .with_rules(spec.rules)
                        .with_value(spec.default),
                );
            }
            form.push(custom);
        }

        if wizard_kind == WizardKind::Registration {
            if let Some(registration) = &step.registration {
                for model in registration_models(registration, step) {
                    form.push(model);
                }
            }
        }
        Ok(())
    }
}

fn group_model(groups: &[GroupOption], params: &Params) -> Result<SubModel> {
    let first = groups
        .first()
        .ok_or_else(|| WizardError::InvalidResponse("group step offers no groups".to_string()))?;
    let options: Vec<SelectOption> = groups
        .iter()
        .map(|g| SelectOption {
            value: g.id.clone(),
            label: g.name.clone(),
        })
        .collect();
    let ids: Vec<String> = options.iter().map(|o| o.value.clone()).collect();

    let selected = params
        .get("group")
        .and_then(Value::as_str)
        .filter(|id| ids.iter().any(|g| g == id))
        .unwrap_or(first.id.as_str())
        .to_string();

    Ok(SubModel::scalar(
        "group",
        FormField::new("group", "Group", FieldKind::Select(options))
            .required(true)
            .with_rule(Rule::OneOf(ids))
            .with_value(Value::String(selected)),
    ))
}

fn code_model(namespace: &str, label: &str) -> SubModel {
    SubModel::scalar(
        namespace,
        FormField::new(namespace, label, FieldKind::Code).required(true),
    )
}

fn availability_field(
    name: &str,
    label: &str,
    kind: FieldKind,
    availability: FieldAvailability,
) -> Option<FormField> {
    availability
        .is_enabled()
        .then(|| FormField::new(name, label, kind).required(availability.is_required()))
}

fn registration_models(registration: &RegistrationFields, step: &FormFieldsStep) -> Vec<SubModel> {
    let mut models = Vec::new();

    let user_fields = [
        availability_field("name", "Full name", FieldKind::Text, registration.name)
            .map(|f| f.with_rule(Rule::MaxLength(100))),
        availability_field("username", "Login name", FieldKind::Text, registration.username)
            .map(|f| f.with_rule(Rule::MaxLength(64))),
        availability_field("email", "E-mail", FieldKind::Email, registration.email)
            .map(|f| f.with_rule(Rule::Email)),
    ];
    let mut user = SubModel::object("user");
    for field in user_fields.into_iter().flatten() {
        user = user.with_field(field);
    }
    if !user.is_empty() {
        models.push(user);
    }

    if let Some(number) = availability_field(
        "number",
        "Mobile phone",
        FieldKind::Phone,
        registration.mobile_phone,
    ) {
        models.push(SubModel::object("mobilePhone").with_field(number));
    }

    if let Some(number) = availability_field(
        "number",
        "Land-line phone",
        FieldKind::Phone,
        registration.land_line_phone,
    ) {
        models.push(
            SubModel::object("landLinePhone").with_field(number).with_field(
                FormField::new("extension", "Extension", FieldKind::Text).with_rule(Rule::Digits),
            ),
        );
    }

    if let Some(address) = registration
        .address
        .as_ref()
        .filter(|a| a.availability.is_enabled() && !a.fields.is_empty())
    {
        let mut model = SubModel::object("address");
        if !address.availability.is_required() {
            model = model.with_gate("Define address", false);
        }
        for name in &address.fields {
            let required = address.required_fields.contains(name);
            model = model.with_field(FormField::new(name.clone(), name.clone(), FieldKind::Text).required(required));
        }
        models.push(model);
    }

    for policy in registration.password_types.iter().filter(|p| p.required) {
        let id = format!("passwords[{}]", policy.id);
        let label = if policy.name.is_empty() {
            policy.id.clone()
        } else {
            policy.name.clone()
        };
        let mut value = FormField::new("value", label.clone(), FieldKind::Password).required(true);
        if let Some(min) = policy.min_length {
            value = value.with_rule(Rule::MinLength(min));
        }
        if let Some(max) = policy.max_length {
            value = value.with_rule(Rule::MaxLength(max));
        }
        if policy.only_numeric {
            value = value.with_rule(Rule::Digits);
        }
        models.push(
            SubModel::list_entry(id.clone(), "passwords")
                .with_field(
                    FormField::new("type", "Type", FieldKind::Hidden)
                        .with_value(Value::String(policy.id.clone())),
                )
                .with_field(value)
                .with_field(
                    FormField::new(
                        "confirmationValue",
                        format!("{} confirmation", label),
                        FieldKind::Password,
                    )
                    .required(true)
                    .matching(format!("{}.value", id)),
                ),
        );
    }

    if !registration.security_questions.is_empty() {
        let options = registration.security_questions.clone();
        let values = options.iter().map(|o| o.value.clone()).collect();
        models.push(
            SubModel::object("securityQuestion")
                .with_field(
                    FormField::new("question", "Security question", FieldKind::Select(options))
                        .required(true)
                        .with_rule(Rule::OneOf(values)),
                )
                .with_field(FormField::new("answer", "Security answer", FieldKind::Text).required(true)),
        );
    }

    if !registration.agreements.is_empty() {
        let names: Vec<&str> = registration.agreements.iter().map(|a| a.name.as_str()).collect();
        models.push(SubModel::scalar(
            "acceptAgreement",
            FormField::new(
                "acceptAgreement",
                format!("I accept {}", names.join(", ")),
                FieldKind::Boolean,
            )
            .with_rule(Rule::MustBeTrue),
        ));
    }

    if let Some(captcha) = &registration.captcha {
        models.push(
            SubModel::object("captcha")
                .with_field(
                    FormField::new("challenge", "Challenge", FieldKind::Hidden)
                        .with_value(Value::String(captcha.challenge.clone())),
                )
                .with_field(FormField::new("response", "Captcha", FieldKind::Captcha).required(true)),
        );
    }

    if registration.require_email_verification && registration.email.is_enabled() {
        models.push(SubModel::scalar(
            "emailVerification",
            FormField::new("emailVerification", "E-mail verification code", FieldKind::Code)
                .with_requirement(Requirement::UnlessVerified {
                    source: "user.email".to_string(),
                    verified: step.verified_email.clone(),
                }),
        ));
    }

    if registration.require_sms_verification && registration.mobile_phone.is_enabled() {
        models.push(SubModel::scalar(
            "smsVerification",
            FormField::new("smsVerification", "SMS verification code", FieldKind::Code)
                .with_requirement(Requirement::UnlessVerified {
                    source: "mobilePhone.number".to_string(),
                    verified: step.verified_sms.clone(),
                }),
        ));
    }

    models
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Validity;
    use crate::model::{Agreement, AddressConfiguration, PasswordPolicy, StepKind};
    use serde_json::json;

    fn form_step(registration: RegistrationFields) -> StepDescriptor {
        StepDescriptor {
            id: "s2".into(),
            name: "Profile".into(),
            detail: StepDetail::FormFields(FormFieldsStep {
                registration: Some(registration),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_group_defaults_to_first() {
        let step = StepDescriptor {
            id: "s1".into(),
            name: String::new(),
            detail: StepDetail::Group {
                groups: vec![
                    GroupOption { id: "G1".into(), name: "One".into() },
                    GroupOption { id: "G2".into(), name: "Two".into() },
                ],
            },
        };
        let form = StepFormAssembler::new()
            .assemble(&step, WizardKind::Registration, &Params::new())
            .unwrap();

        assert_eq!(form.kind(), StepKind::Group);
        assert_eq!(form.value_of("group"), &json!("G1"));

        let mut params = Params::new();
        params.insert("group", json!("G2"));
        let form = StepFormAssembler::new()
            .assemble(&step, WizardKind::Registration, &params)
            .unwrap();
        assert_eq!(form.value_of("group"), &json!("G2"));
    }

    #[test]
    fn test_group_without_options_is_invalid_response() {
        let step = StepDescriptor {
            id: "s1".into(),
            name: String::new(),
            detail: StepDetail::Group { groups: vec![] },
        };
        assert!(matches!(
            StepFormAssembler::new().assemble(&step, WizardKind::Registration, &Params::new()),
            Err(WizardError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_registration_fields_only_for_registration_wizards() {
        let step = form_step(RegistrationFields {
            name: FieldAvailability::Required,
            ..Default::default()
        });

        let form = StepFormAssembler::new()
            .assemble(&step, WizardKind::System, &Params::new())
            .unwrap();
        assert_eq!(form.sub_models().count(), 0);

        let form = StepFormAssembler::new()
            .assemble(&step, WizardKind::Registration, &Params::new())
            .unwrap();
        assert!(form.field("user.name").is_some());
    }

    #[test]
    fn test_full_registration_layout() {
        let step = form_step(RegistrationFields {
            name: FieldAvailability::Required,
            email: FieldAvailability::Optional,
            mobile_phone: FieldAvailability::Optional,
            address: Some(AddressConfiguration {
                availability: FieldAvailability::Optional,
                fields: vec!["addressLine1".into(), "city".into()],
                required_fields: vec!["addressLine1".into()],
            }),
            password_types: vec![
                PasswordPolicy {
                    id: "login".into(),
                    name: "Login password".into(),
                    required: true,
                    min_length: Some(6),
                    max_length: None,
                    only_numeric: false,
                },
                PasswordPolicy {
                    id: "pin".into(),
                    name: "PIN".into(),
                    required: false,
                    min_length: None,
                    max_length: None,
                    only_numeric: true,
                },
            ],
            agreements: vec![Agreement { id: "tos".into(), name: "Terms".into() }],
            require_email_verification: true,
            ..Default::default()
        });

        let mut form = StepFormAssembler::new()
            .assemble(&step, WizardKind::Registration, &Params::new())
            .unwrap();

        let ids: Vec<&str> = form.sub_models().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["user", "mobilePhone", "address", "passwords[login]", "acceptAgreement", "emailVerification"]
        );
        assert!(!form.sub_model("address").unwrap().is_enabled());

        let Validity::Invalid(errors) = form.check() else {
            panic!("expected invalid");
        };
        let paths: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "acceptAgreement",
                "passwords[login].confirmationValue",
                "passwords[login].value",
                "user.name"
            ]
        );

        form.set("user.name", json!("Ann")).unwrap();
        form.set("passwords[login].value", json!("secret1")).unwrap();
        form.set("passwords[login].confirmationValue", json!("secret1")).unwrap();
        form.set("acceptAgreement", json!(true)).unwrap();
        assert_eq!(form.check(), Validity::Valid);

        let contribution = form.contribution();
        assert_eq!(contribution["user"]["name"], "Ann");
        assert_eq!(contribution["passwords"][0]["type"], "login");
        assert!(contribution["address"].is_null());
        assert!(contribution["emailVerification"].is_null());

        let mut params = Params::new();
        params.merge(contribution);
        assert_eq!(params.get("user"), Some(&json!({"name": "Ann"})));
        assert!(!params.contains("address"));
        assert!(!params.contains("emailVerification"));
    }

    #[test]
    fn test_address_toggle_follows_params() {
        let step = form_step(RegistrationFields {
            address: Some(AddressConfiguration {
                availability: FieldAvailability::Optional,
                fields: vec!["city".into()],
                required_fields: vec![],
            }),
            ..Default::default()
        });
        let assembler = StepFormAssembler::new();

        let fresh = assembler
            .assemble(&step, WizardKind::Registration, &Params::new())
            .unwrap();
        assert!(!fresh.sub_model("address").unwrap().is_enabled());

        let mut params = Params::new();
        params.insert("address", json!({"city": "Lisbon"}));
        let revisited = assembler.assemble(&step, WizardKind::Registration, &params).unwrap();
        assert!(revisited.sub_model("address").unwrap().is_enabled());
        assert_eq!(revisited.value_of("address.city"), &json!("Lisbon"));
    }

    #[test]
    fn test_prefill_skips_secrets() {
        let step = form_step(RegistrationFields {
            name: FieldAvailability::Required,
            mobile_phone: FieldAvailability::Required,
            require_sms_verification: true,
            ..Default::default()
        });
        let mut params = Params::new();
        params.insert("user", json!({"name": "Ann"}));
        params.insert("smsVerification", json!("999999"));

        let form = StepFormAssembler::new()
            .assemble(&step, WizardKind::Registration, &params)
            .unwrap();
        assert_eq!(form.value_of("user.name"), &json!("Ann"));
        assert_eq!(form.value_of("smsVerification"), &Value::Null);
    }

    #[test]
    fn test_verification_steps() {
        let step = StepDescriptor {
            id: "v".into(),
            name: String::new(),
            detail: StepDetail::PhoneVerification,
        };
        let form = StepFormAssembler::new()
            .assemble(&step, WizardKind::User, &Params::new())
            .unwrap();
        let field = form.field("smsVerification").unwrap();
        assert!(form.is_required(field));
    }

    #[tokio::test]
    async fn test_async_rule_attached_by_path() {
        let step = form_step(RegistrationFields {
            username: FieldAvailability::Required,
            ..Default::default()
        });
        let assembler = StepFormAssembler::new().with_async_rule(
            "user.username",
            AsyncRule::new(|value| async move {
                (value == "admin").then(|| "Login name is not available".to_string())
            }),
        );
        let mut form = assembler
            .assemble(&step, WizardKind::Registration, &Params::new())
            .unwrap();

        form.set("user.username", json!("admin")).unwrap();
        assert_eq!(form.check(), Validity::Pending(1));
        assert!(form.validate().await.is_err());

        form.set("user.username", json!("ann")).unwrap();
        assert!(form.validate().await.is_ok());
    }
}
