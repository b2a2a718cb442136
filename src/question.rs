//! Question definitions: what a template asks, how defaults are derived and
//! how answers are checked.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;

type ComputeFn = dyn Fn(&Context) -> anyhow::Result<Value> + Send + Sync;
type ValidateFn = dyn Fn(&Value, &Context) -> std::result::Result<(), String> + Send + Sync;

/// Matches identifiers usable as module or variable names.
pub const IDENTIFIER_PATTERN: &str = r"^[_a-zA-Z][_a-zA-Z0-9]*$";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Str,
    Bool,
    Number,
}

/// Where a question's default comes from.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal value. String literals are rendered against earlier answers.
    Value(Value),
    /// Computed from the answers collected so far.
    Computed(Arc<ComputeFn>),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[derive(Clone)]
pub enum Validator {
    /// The answer must be a valid identifier.
    Identifier,
    /// The answer must be a non-blank string.
    NonEmpty,
    /// The answer must match the regex.
    Pattern(Regex),
    Custom(Arc<ValidateFn>),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Identifier => f.write_str("Identifier"),
            Validator::NonEmpty => f.write_str("NonEmpty"),
            Validator::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Validator {
    pub fn identifier() -> Self {
        Validator::Identifier
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Validator::Pattern(Regex::new(pattern)?))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, &Context) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Validator::Custom(Arc::new(f))
    }

    fn check(&self, value: &Value, context: &Context) -> std::result::Result<(), String> {
        match self {
            Validator::Identifier => {
                let text = value.as_str().ok_or("expected a string")?;
                if is_identifier(text) {
                    Ok(())
                } else {
                    Err(format!("'{text}' is not a valid identifier"))
                }
            }
            Validator::NonEmpty => match value {
                Value::String(s) if !s.trim().is_empty() => Ok(()),
                Value::Array(items) if !items.is_empty() => Ok(()),
                Value::String(_) | Value::Array(_) => Err("a value is required".to_string()),
                _ => Ok(()),
            },
            Validator::Pattern(re) => {
                let text = value.as_str().ok_or("expected a string")?;
                if re.is_match(text) {
                    Ok(())
                } else {
                    Err(format!("'{text}' does not match '{}'", re.as_str()))
                }
            }
            Validator::Custom(f) => f(value, context),
        }
    }
}

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER_RE.is_match(text)
}

/// One allowed answer. The label, when set, is what the prompt shows; the
/// value is what lands in the context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ChoiceEntry")]
pub struct Choice {
    pub value: String,
    pub label: Option<String>,
}

impl Choice {
    pub fn labeled<V: Into<String>, L: Into<String>>(value: V, label: L) -> Self {
        Self { value: value.into(), label: Some(label.into()) }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Choice {
    fn from(value: String) -> Self {
        Self { value, label: None }
    }
}

impl From<&str> for Choice {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// Configuration form of a choice: a bare value or `{ label, value }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceEntry {
    Plain(String),
    Labeled { label: String, value: String },
}

impl From<ChoiceEntry> for Choice {
    fn from(entry: ChoiceEntry) -> Self {
        match entry {
            ChoiceEntry::Plain(value) => Choice::from(value),
            ChoiceEntry::Labeled { label, value } => Choice::labeled(value, label),
        }
    }
}

/// One prompt in a template's question list.
#[derive(Debug, Clone)]
pub struct QuestionSpec {
    pub key: String,
    pub prompt: String,
    pub value_type: ValueType,
    pub default: Option<DefaultValue>,
    pub choices: Vec<Choice>,
    pub multiselect: bool,
    pub validator: Option<Validator>,
    /// Template condition over earlier answers. When false the default is used unasked.
    pub when: Option<String>,
    /// Derived key: never asked, always computed from its default.
    pub hidden: bool,
}

impl QuestionSpec {
    pub fn new<K: Into<String>, P: Into<String>>(key: K, prompt: P) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            value_type: ValueType::Str,
            default: None,
            choices: Vec::new(),
            multiselect: false,
            validator: None,
            when: None,
            hidden: false,
        }
    }

    /// A hidden question whose value is computed from the earlier answers.
    pub fn derived<K, F>(key: K, f: F) -> Self
    where
        K: Into<String>,
        F: Fn(&Context) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let key = key.into();
        let mut question = Self::new(key.clone(), key);
        question.default = Some(DefaultValue::Computed(Arc::new(f)));
        question.hidden = true;
        question
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    pub fn computed_default<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(f)));
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Choice>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn multiselect(mut self, multiselect: bool) -> Self {
        self.multiselect = multiselect;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn when<S: Into<String>>(mut self, condition: S) -> Self {
        self.when = Some(condition.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Evaluates the default against the answers collected so far.
    pub fn effective_default(
        &self,
        context: &Context,
        renderer: &dyn TemplateRenderer,
    ) -> Result<Option<Value>> {
        let location = format!("default of question '{}'", self.key);
        match &self.default {
            None => Ok(None),
            Some(DefaultValue::Value(Value::String(s))) => {
                Ok(Some(Value::String(renderer.render(s, context, &location)?)))
            }
            Some(DefaultValue::Value(Value::Array(items))) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(Value::String(renderer.render(s, context, &location)?)),
                    other => Ok(other.clone()),
                })
                .collect::<Result<Vec<_>>>()
                .map(|items| Some(Value::Array(items))),
            Some(DefaultValue::Value(value)) => Ok(Some(value.clone())),
            Some(DefaultValue::Computed(f)) => f(context)
                .map(Some)
                .map_err(|e| Error::InvalidAnswer { key: self.key.clone(), reason: e.to_string() }),
        }
    }

    /// The value stored when the question is skipped and declares no default.
    pub fn fallback(&self) -> Value {
        if self.multiselect {
            return Value::Array(Vec::new());
        }
        if let Some(first) = self.choices.first() {
            return Value::String(first.value.clone());
        }
        match self.value_type {
            ValueType::Str => Value::String(String::new()),
            ValueType::Bool => Value::Bool(false),
            ValueType::Number => Value::from(0),
        }
    }

    /// Converts a raw answer to the declared type.
    pub fn coerce(&self, raw: Value) -> Result<Value> {
        if self.multiselect {
            return match raw {
                Value::Array(items) => Ok(Value::Array(items)),
                Value::String(s) => Ok(Value::Array(
                    s.split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(|item| Value::String(item.to_string()))
                        .collect(),
                )),
                other => Err(self.invalid(format!("expected a list, found {other}"))),
            };
        }

        match (self.value_type, raw) {
            (ValueType::Str, Value::String(s)) => Ok(Value::String(s)),
            (ValueType::Str, value @ (Value::Number(_) | Value::Bool(_))) => {
                Ok(Value::String(value.to_string()))
            }
            (ValueType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ValueType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.invalid(format!("'{s}' is not a yes/no answer"))),
            },
            (ValueType::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (ValueType::Number, Value::String(s)) => serde_json::from_str::<serde_json::Number>(s.trim())
                .map(Value::Number)
                .map_err(|_| self.invalid(format!("'{s}' is not a number"))),
            (_, other) => Err(self.invalid(format!("unexpected value {other}"))),
        }
    }

    /// Checks choice membership and the validator.
    pub fn check(&self, value: &Value, context: &Context) -> Result<()> {
        if !self.choices.is_empty() {
            let members: Vec<&Value> = match value {
                Value::Array(items) if self.multiselect => items.iter().collect(),
                single => vec![single],
            };
            for member in members {
                let allowed = member.as_str().is_some_and(|s| self.choices.iter().any(|c| c.value == s));
                if !allowed {
                    let values: Vec<&str> = self.choices.iter().map(|c| c.value.as_str()).collect();
                    return Err(self.invalid(format!("{member} is not one of [{}]", values.join(", "))));
                }
            }
        }

        if let Some(validator) = &self.validator {
            validator.check(value, context).map_err(|reason| self.invalid(reason))?;
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidAnswer { key: self.key.clone(), reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("my_pkg"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("my-pkg"));
        assert!(!is_identifier("1pkg"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_coerce_bool_from_text() {
        let question = QuestionSpec::new("docs", "Add docs?").value_type(ValueType::Bool);
        assert_eq!(question.coerce(json!("yes")).unwrap(), json!(true));
        assert_eq!(question.coerce(json!("N")).unwrap(), json!(false));
        assert!(question.coerce(json!("maybe")).is_err());
    }

    #[test]
    fn test_coerce_number_from_text() {
        let question = QuestionSpec::new("port", "API port").value_type(ValueType::Number);
        assert_eq!(question.coerce(json!("8000")).unwrap(), json!(8000));
        assert!(question.coerce(json!("eighty")).is_err());
    }

    #[test]
    fn test_multiselect_membership() {
        let question = QuestionSpec::new("packages", "Packages")
            .choices(["api", "worker", "cli"])
            .multiselect(true);
        let ctx = Context::new();
        assert!(question.check(&json!(["api", "cli"]), &ctx).is_ok());
        assert!(question.check(&json!(["api", "frontend"]), &ctx).is_err());
        assert_eq!(question.coerce(json!("api, worker")).unwrap(), json!(["api", "worker"]));
    }

    #[test]
    fn test_labeled_choice_checks_value() {
        let question = QuestionSpec::new("license", "License")
            .choices([Choice::labeled("mit", "MIT License"), Choice::from("apache-2.0")]);
        let ctx = Context::new();
        assert!(question.check(&json!("mit"), &ctx).is_ok());
        assert!(question.check(&json!("MIT License"), &ctx).is_err());
        assert_eq!(question.choices[0].to_string(), "MIT License");
        assert_eq!(question.choices[1].to_string(), "apache-2.0");
        assert_eq!(question.fallback(), json!("mit"));
    }

    #[test]
    fn test_choice_entries_deserialize() {
        let choices: Vec<Choice> =
            serde_yaml::from_str("- plain\n- label: Pretty\n  value: pretty\n").unwrap();
        assert_eq!(choices, vec![Choice::from("plain"), Choice::labeled("pretty", "Pretty")]);
    }
}
