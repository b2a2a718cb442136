//! Substitution context built by the resolver and read by the renderer.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Ordered mapping from variable name to resolved answer.
///
/// Serializes as a plain JSON object so it can be handed directly to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context {
    values: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new key. Fails if the key is already present.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) -> Result<()> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(Error::InvalidAnswer {
                key,
                reason: "key is already defined in the context".to_string(),
            });
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Sets a key, replacing any previous value. Used by hooks that normalize answers.
    pub fn set<K: Into<String>>(&mut self, key: K, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Returns the value for `key` or a `MissingContextKey` error.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values.get(key).ok_or_else(|| Error::MissingContextKey {
            key: key.to_string(),
            location: "context lookup".to_string(),
        })
    }

    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value as a string slice when it is a JSON string.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| Error::InvalidAnswer {
            key: key.to_string(),
            reason: format!("expected a string, found {value}"),
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl From<IndexMap<String, Value>> for Context {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }
}
