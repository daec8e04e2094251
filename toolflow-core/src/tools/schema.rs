//! Structural output schemas
//!
//! A deliberately small subset of JSON Schema: a top-level type, required
//! object keys and per-property types. Enough to catch a tool that returned
//! the wrong shape without pulling in a full schema engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON value type accepted by a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    /// Matches anything
    #[default]
    Any,
    Null,
    Boolean,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl JsonType {
    /// Check whether a value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            JsonType::Any => true,
            JsonType::Null => value.is_null(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.is_i64() || value.is_u64(),
            JsonType::String => value.is_string(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }

    /// Name of the type a value actually has
    pub fn of(value: &Value) -> JsonType {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

/// Expected shape of a tool's successful result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Top-level type
    #[serde(rename = "type", default)]
    pub kind: JsonType,

    /// Keys that must be present (objects only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Expected type of individual keys, when present
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonType>,
}

/// One mismatch between a value and its schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Path of the offending field ("$" for the root)
    pub field: String,

    /// What went wrong
    pub message: String,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl OutputSchema {
    /// Schema requiring an object
    pub fn object() -> Self {
        Self {
            kind: JsonType::Object,
            ..Default::default()
        }
    }

    /// Schema requiring a specific top-level type
    pub fn of_type(kind: JsonType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Require a key
    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required.push(key.into());
        self
    }

    /// Constrain a property's type
    pub fn property(mut self, key: impl Into<String>, kind: JsonType) -> Self {
        self.properties.insert(key.into(), kind);
        self
    }

    /// Check a value, collecting every violation
    pub fn check(&self, value: &Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();

        if !self.kind.matches(value) {
            violations.push(SchemaViolation::new(
                "$",
                format!("expected {:?}, got {:?}", self.kind, JsonType::of(value)),
            ));
            return Err(violations);
        }

        if let Value::Object(map) = value {
            for key in &self.required {
                if !map.contains_key(key) {
                    violations.push(SchemaViolation::new(key.clone(), "required field missing"));
                }
            }
            for (key, kind) in &self.properties {
                if let Some(field) = map.get(key) {
                    if !kind.matches(field) {
                        violations.push(SchemaViolation::new(
                            key.clone(),
                            format!("expected {:?}, got {:?}", kind, JsonType::of(field)),
                        ));
                    }
                }
            }
        } else if !self.required.is_empty() {
            violations.push(SchemaViolation::new("$", "required fields need an object"));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
