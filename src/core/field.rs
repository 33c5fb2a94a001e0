//! Field values and equality filters for the persistence interface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A polymorphic field value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    /// Whether this stored value satisfies an equality condition
    ///
    /// List values match when any element equals `expected`, so a
    /// `students == id` condition reads as "enrolled".
    pub fn matches(&self, expected: &FieldValue) -> bool {
        match self {
            FieldValue::List(items) => items.iter().any(|item| item == expected),
            other => other == expected,
        }
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Conjunction of `field == value` conditions
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FieldValue)>,
}

impl Filter {
    /// Filter matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Evaluate the filter against a field accessor
    ///
    /// Unknown fields never match.
    pub fn matches<F>(&self, field_value: F) -> bool
    where
        F: Fn(&str) -> Option<FieldValue>,
    {
        self.conditions.iter().all(|(field, expected)| {
            field_value(field).is_some_and(|actual| actual.matches(expected))
        })
    }
}
