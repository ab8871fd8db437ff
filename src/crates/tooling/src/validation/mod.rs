//! Field validation over JSON values
//!
//! Rules are evaluated against `serde_json::Value` so the same rule set can be
//! attached to text inputs, numbers, selections and flags alike. Every rule
//! except [`Rule::Required`] treats a blank value as valid, so optional fields
//! left empty never produce format errors.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tooling::validation::Validator;
//!
//! let email = json!("user@example.com");
//! Validator::new(&email, "email")
//!     .required()
//!     .max_length(100)
//!     .email()
//!     .validate()
//!     .unwrap();
//!
//! let code = json!("");
//! let errors = Validator::new(&code, "code").required().validate_all().unwrap_err();
//! assert_eq!(errors, vec!["code is required".to_string()]);
//! ```

use crate::{Result, ToolingError};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use std::sync::Arc;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid e-mail pattern"));

/// Validation rule for a value
pub trait ValidationRule: Send + Sync {
    /// Validate the value
    ///
    /// # Returns
    ///
    /// Ok(()) if valid, Err with message if invalid
    fn validate(&self, value: &Value, field_name: &str) -> std::result::Result<(), String>;
}

/// Whether a value counts as "not filled in".
///
/// Null, whitespace-only strings, empty arrays and empty objects are blank.
/// `false` is not blank; use [`Rule::MustBeTrue`] for mandatory flags.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

type CustomCheck = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// A single declarative rule
#[derive(Clone)]
pub enum Rule {
    /// Value must not be blank
    Required,
    /// Text must have at least this many characters
    MinLength(usize),
    /// Text must have at most this many characters
    MaxLength(usize),
    /// Text must match the pattern
    Pattern { regex: Regex, pattern: String },
    /// Text must look like an e-mail address
    Email,
    /// Text must contain digits only
    Digits,
    /// Value must be an integer
    Integer,
    /// Value must be a number
    Decimal,
    /// Numeric value must be at least this
    Min(f64),
    /// Numeric value must be at most this
    Max(f64),
    /// Flag must be checked
    MustBeTrue,
    /// Value (or every element of an array value) must be one of these
    OneOf(Vec<String>),
    /// Arbitrary check
    Custom(CustomCheck),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "Required"),
            Rule::MinLength(n) => write!(f, "MinLength({})", n),
            Rule::MaxLength(n) => write!(f, "MaxLength({})", n),
            Rule::Pattern { pattern, .. } => write!(f, "Pattern({})", pattern),
            Rule::Email => write!(f, "Email"),
            Rule::Digits => write!(f, "Digits"),
            Rule::Integer => write!(f, "Integer"),
            Rule::Decimal => write!(f, "Decimal"),
            Rule::Min(n) => write!(f, "Min({})", n),
            Rule::Max(n) => write!(f, "Max({})", n),
            Rule::MustBeTrue => write!(f, "MustBeTrue"),
            Rule::OneOf(options) => write!(f, "OneOf({:?})", options),
            Rule::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl Rule {
    /// Build a pattern rule, failing if the regex does not compile
    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ToolingError::InvalidRule(format!("pattern '{}': {}", pattern, e)))?;
        Ok(Rule::Pattern {
            regex,
            pattern: pattern.to_string(),
        })
    }

    /// Build a custom rule from a closure
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Rule::Custom(Arc::new(check))
    }
}

impl ValidationRule for Rule {
    fn validate(&self, value: &Value, field_name: &str) -> std::result::Result<(), String> {
        if let Rule::Required = self {
            return if is_blank(value) {
                Err(format!("{} is required", field_name))
            } else {
                Ok(())
            };
        }
        if let Rule::MustBeTrue = self {
            return match value {
                Value::Bool(true) => Ok(()),
                _ => Err(format!("{} must be accepted", field_name)),
            };
        }
        if is_blank(value) {
            return Ok(());
        }

        match self {
            Rule::MinLength(min) => match as_text(value) {
                Some(text) if text.chars().count() < *min => Err(format!(
                    "{} must be at least {} characters (got {})",
                    field_name,
                    min,
                    text.chars().count()
                )),
                _ => Ok(()),
            },
            Rule::MaxLength(max) => match as_text(value) {
                Some(text) if text.chars().count() > *max => Err(format!(
                    "{} must be at most {} characters (got {})",
                    field_name,
                    max,
                    text.chars().count()
                )),
                _ => Ok(()),
            },
            Rule::Pattern { regex, pattern } => match as_text(value) {
                Some(text) if regex.is_match(&text) => Ok(()),
                _ => Err(format!("{} must match pattern: {}", field_name, pattern)),
            },
            Rule::Email => {
                let text = as_text(value).unwrap_or_default();
                if EMAIL_REGEX.is_match(text.trim()) {
                    Ok(())
                } else {
                    Err(format!("{} is not a valid e-mail address", field_name))
                }
            }
            Rule::Digits => match as_text(value) {
                Some(text) if text.chars().all(|c| c.is_ascii_digit()) => Ok(()),
                _ => Err(format!("{} must contain only digits", field_name)),
            },
            Rule::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
                Value::String(s) if s.trim().parse::<i64>().is_ok() => Ok(()),
                _ => Err(format!("{} must be a whole number", field_name)),
            },
            Rule::Decimal => match as_number(value) {
                Some(_) => Ok(()),
                None => Err(format!("{} must be a number", field_name)),
            },
            Rule::Min(min) => match as_number(value) {
                Some(n) if n < *min => Err(format!(
                    "{} must be at least {} (got {})",
                    field_name, min, n
                )),
                _ => Ok(()),
            },
            Rule::Max(max) => match as_number(value) {
                Some(n) if n > *max => Err(format!(
                    "{} must be at most {} (got {})",
                    field_name, max, n
                )),
                _ => Ok(()),
            },
            Rule::OneOf(options) => {
                let chosen: Vec<String> = match value {
                    Value::Array(items) => items.iter().filter_map(as_text).collect(),
                    other => as_text(other).into_iter().collect(),
                };
                match chosen.iter().find(|c| !options.contains(c)) {
                    Some(bad) => Err(format!("{} has an invalid option: {}", field_name, bad)),
                    None => Ok(()),
                }
            }
            Rule::Custom(check) => check(value),
            Rule::Required | Rule::MustBeTrue => Ok(()),
        }
    }
}

/// Ordered, reusable collection of rules attached to one field
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append a rule in place
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are declared
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule and collect the messages of those that fail
    pub fn check(&self, value: &Value, field_name: &str) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|rule| rule.validate(value, field_name).err())
            .collect()
    }
}

/// Fluent validator for a single value
///
/// Allows chaining multiple validation rules and collecting errors.
pub struct Validator<'a> {
    value: &'a Value,
    field_name: String,
    rules: RuleSet,
}

impl<'a> Validator<'a> {
    /// Create a new validator for a value
    ///
    /// # Arguments
    ///
    /// * `value` - Value to validate
    /// * `field_name` - Name of the field (for error messages)
    pub fn new(value: &'a Value, field_name: impl Into<String>) -> Self {
        Self {
            value,
            field_name: field_name.into(),
            rules: RuleSet::new(),
        }
    }

    /// Use an existing rule set
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Value must be filled in
    pub fn required(mut self) -> Self {
        self.rules.push(Rule::Required);
        self
    }

    /// Ensure text has minimum length
    pub fn min_length(mut self, min: usize) -> Self {
        self.rules.push(Rule::MinLength(min));
        self
    }

    /// Ensure text has maximum length
    pub fn max_length(mut self, max: usize) -> Self {
        self.rules.push(Rule::MaxLength(max));
        self
    }

    /// Ensure text matches regex pattern
    pub fn matches(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(Rule::pattern(pattern)?);
        Ok(self)
    }

    /// Ensure text is an e-mail address
    pub fn email(mut self) -> Self {
        self.rules.push(Rule::Email);
        self
    }

    /// Ensure numeric value is within range (inclusive)
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.rules.push(Rule::Min(min));
        self.rules.push(Rule::Max(max));
        self
    }

    /// Add a custom validation rule
    pub fn custom<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push(Rule::custom(check));
        self
    }

    /// Validate all rules
    ///
    /// # Returns
    ///
    /// Ok(()) if all rules pass, Err with first error message
    pub fn validate(self) -> Result<()> {
        match self.rules.check(self.value, &self.field_name).into_iter().next() {
            Some(msg) => Err(ToolingError::General(msg)),
            None => Ok(()),
        }
    }

    /// Validate all rules and collect all errors
    pub fn validate_all(self) -> std::result::Result<(), Vec<String>> {
        let errors = self.rules.check(self.value, &self.field_name);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
