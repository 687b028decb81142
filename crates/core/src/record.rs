//! Remote record model.
//!
//! The store wraps every field as `{ "value": <scalar> }` (optionally with a
//! `type` tag). An absent field means an absent wrapper; that is not a
//! transport error, and consumers decide how to treat it.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One wrapped field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub value: JsonValue,
}

impl FieldValue {
    pub fn new(value: impl Into<JsonValue>) -> Self {
        Self {
            field_type: None,
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(JsonValue::String(value.into()))
    }

    /// Scalar text of the value.
    ///
    /// Strings are returned as-is unless blank; numbers are rendered in
    /// decimal. `null`, blank strings, and non-scalar values count as missing.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match &self.value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(Cow::Borrowed(s.as_str())),
            JsonValue::Number(n) => Some(Cow::Owned(n.to_string())),
            _ => None,
        }
    }
}

/// A record as returned by a query: field code → wrapped value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper, mostly for tests and fixtures.
    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), FieldValue::text(value));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Non-blank scalar text of `field`, or `None` if absent/empty.
    pub fn text(&self, field: &str) -> Option<Cow<'_, str>> {
        self.0.get(field).and_then(FieldValue::as_text)
    }

    /// Keep only the requested fields (what a `fields` projection returns).
    pub fn project(&self, fields: &[String]) -> Record {
        if fields.is_empty() {
            return self.clone();
        }
        Record(
            self.0
                .iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
