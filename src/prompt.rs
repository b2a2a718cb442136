//! Answer providers: where raw answers come from.
//! Batch runs read a prepared mapping; interactive runs ask on the terminal.

use std::path::Path;

use dialoguer::{Confirm, Input, MultiSelect, Select};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::question::{QuestionSpec, ValueType};

/// One request for an answer.
pub struct AnswerRequest<'a> {
    pub question: &'a QuestionSpec,
    /// Prompt text rendered against earlier answers.
    pub prompt: &'a str,
    pub default: Option<&'a Value>,
    pub context: &'a Context,
    /// Number of earlier attempts rejected for this question.
    pub attempt: usize,
}

/// Trait for anything that can supply raw answers to questions.
pub trait AnswerProvider {
    fn answer(&self, request: &AnswerRequest<'_>) -> Result<Value>;

    /// Interactive providers are asked again after an invalid answer;
    /// batch providers abort the run instead.
    fn is_interactive(&self) -> bool;
}

/// Non-interactive provider backed by a fixed mapping of answers.
#[derive(Debug, Clone, Default)]
pub struct PreparedAnswers {
    answers: IndexMap<String, Value>,
}

impl PreparedAnswers {
    pub fn new(answers: IndexMap<String, Value>) -> Self {
        Self { answers }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { answers: map.into_iter().collect() }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::InvalidAnswer {
                key: "<answers>".to_string(),
                reason: format!("expected a mapping of answers, found {other}"),
            }),
        }
    }

    pub fn insert<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.answers.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.answers.get(key)
    }
}

impl AnswerProvider for PreparedAnswers {
    fn answer(&self, request: &AnswerRequest<'_>) -> Result<Value> {
        let key = &request.question.key;
        if let Some(value) = self.answers.get(key) {
            debug!("Using prepared answer for '{key}': {value}");
            return Ok(value.clone());
        }
        match request.default {
            Some(default) => Ok(default.clone()),
            None => Err(Error::InvalidAnswer {
                key: key.clone(),
                reason: "no answer was supplied and the question has no default".to_string(),
            }),
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Interactive provider that prompts on the terminal with dialoguer.
///
/// Preloaded answers are used on the first attempt only, so an invalid
/// preloaded value falls through to a real prompt.
#[derive(Debug, Default)]
pub struct DialoguerPrompter {
    preloaded: PreparedAnswers,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preloaded(preloaded: PreparedAnswers) -> Self {
        Self { preloaded }
    }

    fn prompt_selection(&self, request: &AnswerRequest<'_>) -> Result<Value> {
        let question = request.question;
        let default_index = request
            .default
            .and_then(Value::as_str)
            .and_then(|d| question.choices.iter().position(|choice| choice.value == d))
            .unwrap_or(0);

        let selection = Select::new()
            .with_prompt(request.prompt)
            .default(default_index)
            .items(&question.choices)
            .interact()
            .map_err(|e| prompt_error(question, e))?;

        Ok(Value::String(question.choices[selection].value.clone()))
    }

    fn prompt_multiselect(&self, request: &AnswerRequest<'_>) -> Result<Value> {
        let question = request.question;
        let defaults: Vec<bool> = question
            .choices
            .iter()
            .map(|choice| {
                request
                    .default
                    .and_then(Value::as_array)
                    .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(choice.value.as_str())))
            })
            .collect();

        let selections = MultiSelect::new()
            .with_prompt(request.prompt)
            .items(&question.choices)
            .defaults(&defaults)
            .interact()
            .map_err(|e| prompt_error(question, e))?;

        Ok(Value::Array(
            selections.into_iter().map(|i| Value::String(question.choices[i].value.clone())).collect(),
        ))
    }

    fn prompt_bool(&self, request: &AnswerRequest<'_>) -> Result<Value> {
        let default = request.default.and_then(Value::as_bool).unwrap_or(false);
        let result = Confirm::new()
            .with_prompt(request.prompt)
            .default(default)
            .interact()
            .map_err(|e| prompt_error(request.question, e))?;
        Ok(Value::Bool(result))
    }

    fn prompt_text(&self, request: &AnswerRequest<'_>) -> Result<Value> {
        let default = match request.default {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let input: String = Input::new()
            .with_prompt(request.prompt)
            .default(default)
            .interact_text()
            .map_err(|e| prompt_error(request.question, e))?;
        Ok(Value::String(input))
    }
}

fn prompt_error(question: &QuestionSpec, err: dialoguer::Error) -> Error {
    Error::InvalidAnswer { key: question.key.clone(), reason: err.to_string() }
}

impl AnswerProvider for DialoguerPrompter {
    fn answer(&self, request: &AnswerRequest<'_>) -> Result<Value> {
        if request.attempt == 0 {
            if let Some(value) = self.preloaded.get(&request.question.key) {
                println!("Using provided value for {}: {}", request.question.key, value);
                return Ok(value.clone());
            }
        } else {
            warn!("Please answer '{}' again.", request.question.key);
        }

        let question = request.question;
        if !question.choices.is_empty() {
            if question.multiselect {
                self.prompt_multiselect(request)
            } else {
                self.prompt_selection(request)
            }
        } else {
            match question.value_type {
                ValueType::Bool => self.prompt_bool(request),
                ValueType::Str | ValueType::Number => self.prompt_text(request),
            }
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// Parses `key=value` pairs. Values that parse as JSON keep their type,
/// everything else is taken as a string.
pub fn parse_key_value_params<S: AsRef<str>>(params: &[S]) -> Result<IndexMap<String, Value>> {
    let mut result = IndexMap::new();
    for param in params {
        let param = param.as_ref();
        let (key, raw) = param.split_once('=').ok_or_else(|| Error::InvalidAnswer {
            key: param.to_string(),
            reason: "expected 'key=value'".to_string(),
        })?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        result.insert(key.trim().to_string(), value);
    }
    Ok(result)
}

/// Loads a YAML or JSON mapping of answers from a file.
pub fn load_answers_file<P: AsRef<Path>>(path: P) -> Result<IndexMap<String, Value>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let answers: Option<IndexMap<String, Value>> = serde_yaml::from_str(&content)
        .map_err(|e| Error::ConfigError { path: path.to_path_buf(), reason: e.to_string() })?;
    Ok(answers.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_value_params() {
        let params = parse_key_value_params(&["project_name=demo", "docs=true", "port=8000"]).unwrap();
        assert_eq!(params["project_name"], json!("demo"));
        assert_eq!(params["docs"], json!(true));
        assert_eq!(params["port"], json!(8000));
    }

    #[test]
    fn test_parse_key_value_params_rejects_missing_separator() {
        assert!(parse_key_value_params(&["project_name"]).is_err());
    }
}
