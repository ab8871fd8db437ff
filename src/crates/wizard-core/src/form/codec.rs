//! Custom field metadata and typed conversion

use super::FieldKind;
use crate::error::{Result, WizardError};
use crate::model::{CustomFieldDeclaration, CustomFieldType};
use chrono::NaiveDate;
use serde_json::{Number, Value};
use std::fmt;
use tooling::validation::{Rule, RuleSet};

const URL_PATTERN: &str = r"^https?://\S+$";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// What a custom field declaration turns into
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub rules: RuleSet,
    pub required: bool,
    pub default: Value,
}

/// Field metadata and conversion between raw input and typed JSON
pub trait CustomFieldCodec: Send + Sync + fmt::Debug {
    /// Input kind and rules for a server-declared custom field
    fn describe(&self, declaration: &CustomFieldDeclaration) -> Result<FieldSpec>;

    /// Convert raw text into the JSON value sent to the server
    ///
    /// Blank input converts to null.
    fn parse(&self, kind: &FieldKind, raw: &str) -> std::result::Result<Value, String>;

    /// Render a value for display
    fn format(&self, _kind: &FieldKind, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        }
    }
}

/// Codec covering the built-in custom field types
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCustomFieldCodec;

fn parse_date(text: &str) -> std::result::Result<(), String> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| format!("'{}' is not a date (YYYY-MM-DD)", text))
}

fn resolve_option(kind: &FieldKind, token: &str) -> std::result::Result<String, String> {
    let options = kind.options();
    if let Ok(index) = token.parse::<usize>() {
        if (1..=options.len()).contains(&index) {
            return Ok(options[index - 1].value.clone());
        }
    }
    options
        .iter()
        .find(|o| o.value == token || o.label.eq_ignore_ascii_case(token))
        .map(|o| o.value.clone())
        .ok_or_else(|| format!("'{}' is not one of the offered options", token))
}

impl CustomFieldCodec for DefaultCustomFieldCodec {
    fn describe(&self, declaration: &CustomFieldDeclaration) -> Result<FieldSpec> {
        let mut rules = RuleSet::new();
        let kind = match declaration.field_type {
            CustomFieldType::String => FieldKind::Text,
            CustomFieldType::Text => FieldKind::MultilineText,
            CustomFieldType::Integer => {
                rules.push(Rule::Integer);
                FieldKind::Integer
            }
            CustomFieldType::Decimal => {
                rules.push(Rule::Decimal);
                FieldKind::Decimal
            }
            CustomFieldType::Boolean => FieldKind::Boolean,
            CustomFieldType::Date => {
                rules.push(Rule::custom(|v| match v.as_str() {
                    Some(text) => parse_date(text),
                    None => Err("date must be text".to_string()),
                }));
                FieldKind::Date
            }
            CustomFieldType::SingleSelection | CustomFieldType::MultiSelection => {
                let options = declaration.possible_values.clone();
                rules.push(Rule::OneOf(options.iter().map(|o| o.value.clone()).collect()));
                if declaration.field_type == CustomFieldType::SingleSelection {
                    FieldKind::Select(options)
                } else {
                    FieldKind::MultiSelect(options)
                }
            }
            CustomFieldType::Url => {
                rules.push(Rule::pattern(URL_PATTERN).map_err(|e| {
                    WizardError::Configuration(e.to_string())
                })?);
                FieldKind::Url
            }
            CustomFieldType::Email => {
                rules.push(Rule::Email);
                FieldKind::Email
            }
        };

        if let Some(max) = declaration.max_length {
            rules.push(Rule::MaxLength(max));
        }
        if let Some(min) = declaration.min_value {
            rules.push(Rule::Min(min));
        }
        if let Some(max) = declaration.max_value {
            rules.push(Rule::Max(max));
        }
        if let Some(pattern) = &declaration.pattern {
            let rule = Rule::pattern(pattern).map_err(|e| {
                WizardError::InvalidResponse(format!(
                    "custom field '{}': {}",
                    declaration.internal_name, e
                ))
            })?;
            rules.push(rule);
        }

        Ok(FieldSpec {
            kind,
            rules,
            required: declaration.required,
            default: declaration.default_value.clone().unwrap_or(Value::Null),
        })
    }

    fn parse(&self, kind: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
        let text = if *kind == FieldKind::Password {
            raw
        } else {
            raw.trim()
        };
        if text.is_empty() {
            return Ok(Value::Null);
        }

        match kind {
            FieldKind::Integer => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{}' is not a whole number", text)),
            FieldKind::Decimal => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a number", text)),
            FieldKind::Boolean => match text.to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" | "off" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not yes or no", text)),
            },
            FieldKind::Date => parse_date(text).map(|_| Value::String(text.to_string())),
            FieldKind::Select(_) => resolve_option(kind, text).map(Value::String),
            FieldKind::MultiSelect(_) => text
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| resolve_option(kind, t).map(Value::String))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Ok(Value::String(text.to_string())),
        }
    }

    fn format(&self, kind: &FieldKind, value: &Value) -> String {
        if kind.is_secret() && !value.is_null() {
            return "********".to_string();
        }
        let label = |v: &str| {
            kind.options()
                .iter()
                .find(|o| o.value == v)
                .map(|o| o.label.clone())
                .unwrap_or_else(|| v.to_string())
        };
        match (kind, value) {
            (FieldKind::Select(_), Value::String(v)) => label(v),
            (FieldKind::MultiSelect(_), Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(label)
                .collect::<Vec<_>>()
                .join(", "),
            (FieldKind::Boolean, Value::Bool(b)) => (if *b { "yes" } else { "no" }).to_string(),
            _ => match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}
