use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

pub const WORKFLOW_NAME_FIELD: &str = "workflow_name";
pub const WORKFLOW_DESCRIPTION_FIELD: &str = "workflow_description";

/// A single primitive field value extracted from a workflow run.
///
/// Nested arrays and objects are kept as their compact JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Null values and blank strings count as absent.
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::String(s) => !s.trim().is_empty(),
            FieldValue::Number(_) | FieldValue::Bool(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s.trim()),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::String(s),
            other @ (Value::Array(_) | Value::Object(_)) => FieldValue::String(other.to_string()),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Number(n) => Value::Number(n),
            FieldValue::String(s) => Value::String(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(FieldValue::Null, FieldValue::Number)
    }
}

/// Fields describing one workflow execution. The set of keys is open-ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionSummary {
    fields: BTreeMap<String, FieldValue>,
}

impl ExecutionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some_and(FieldValue::is_present)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of fields carrying a usable value, in key order.
    pub fn present_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_present())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Reject summaries no tier could reason about.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(AppError::InvalidInput(
                "execution summary has no fields".to_string(),
            ));
        }
        if !self.fields.values().any(FieldValue::is_present) {
            return Err(AppError::InvalidInput(
                "execution summary has only empty fields".to_string(),
            ));
        }
        Ok(())
    }

    /// The workflow's own name and description, when the summary carries them.
    pub fn workflow_label(&self) -> Option<String> {
        let name = self.present_str(WORKFLOW_NAME_FIELD);
        let description = self.present_str(WORKFLOW_DESCRIPTION_FIELD);
        match (name, description) {
            (Some(n), Some(d)) => Some(format!("{n}: {d}")),
            (Some(n), None) => Some(n.to_string()),
            (None, Some(d)) => Some(d.to_string()),
            (None, None) => None,
        }
    }

    /// Render the summary as a short sentence for embedding.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(label) = self.workflow_label() {
            parts.push(label);
        }

        parts.extend(
            self.fields
                .iter()
                .filter(|(k, v)| {
                    v.is_present()
                        && !k.eq_ignore_ascii_case(WORKFLOW_NAME_FIELD)
                        && !k.eq_ignore_ascii_case(WORKFLOW_DESCRIPTION_FIELD)
                })
                .map(|(k, v)| format!("{k}: {v}")),
        );

        parts.join(", ")
    }

    fn present_str(&self, name: &str) -> Option<&str> {
        self.get(name)
            .filter(|v| v.is_present())
            .and_then(FieldValue::as_str)
            .map(str::trim)
    }
}

impl<K, V> FromIterator<(K, V)> for ExecutionSummary
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
