//! Response validation
//!
//! A tool can return `Ok` and still hand back garbage. The invoker runs
//! every raw result through a [`ResponseValidator`] and treats a structural
//! mismatch as a (retryable) failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::tools::{OutputSchema, ToolDefinition};

/// Result of validating a raw tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Whether the result has the expected shape
    pub success: bool,

    /// The (possibly normalized) result, on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// What was wrong, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationOutcome {
    /// Accept a value
    pub fn valid(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Reject with a reason
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Structural check of tool results, independent of the tool's own success
pub trait ResponseValidator: Send + Sync {
    /// Validate one raw result
    fn validate(&self, definition: &ToolDefinition, raw: Value) -> ValidationOutcome;
}

/// Validator that accepts every result
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllValidator;

impl ResponseValidator for AcceptAllValidator {
    fn validate(&self, _definition: &ToolDefinition, raw: Value) -> ValidationOutcome {
        ValidationOutcome::valid(raw)
    }
}

/// Validator checking results against per-tool output schemas
///
/// Uses the definition's `output_schema` unless an override was registered
/// for the tool. Tools with neither are accepted as-is.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    overrides: HashMap<String, OutputSchema>,
}

impl SchemaValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: override the schema for a tool
    pub fn with_schema(mut self, tool: impl Into<String>, schema: OutputSchema) -> Self {
        self.overrides.insert(tool.into(), schema);
        self
    }
}

impl ResponseValidator for SchemaValidator {
    fn validate(&self, definition: &ToolDefinition, raw: Value) -> ValidationOutcome {
        let schema = self
            .overrides
            .get(&definition.name)
            .or(definition.output_schema.as_ref());

        let Some(schema) = schema else {
            return ValidationOutcome::valid(raw);
        };

        match schema.check(&raw) {
            Ok(()) => ValidationOutcome::valid(raw),
            Err(violations) => ValidationOutcome::invalid(format!(
                "Result of '{}' failed validation: {}",
                definition.name,
                violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::JsonType;
    use serde_json::json;

    #[test]
    fn test_accept_all() {
        let def = ToolDefinition::new("t");
        let outcome = AcceptAllValidator.validate(&def, json!("anything"));
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(json!("anything")));
    }

    #[test]
    fn test_definition_schema() {
        let def = ToolDefinition::new("fetch")
            .with_output_schema(OutputSchema::object().require("status"));
        let validator = SchemaValidator::new();

        assert!(validator.validate(&def, json!({"status": 200})).success);

        let outcome = validator.validate(&def, json!({"body": ""}));
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("status"));
    }

    #[test]
    fn test_override_wins() {
        let def = ToolDefinition::new("fetch").with_output_schema(OutputSchema::object());
        let validator =
            SchemaValidator::new().with_schema("fetch", OutputSchema::of_type(JsonType::String));

        assert!(validator.validate(&def, json!("text")).success);
        assert!(!validator.validate(&def, json!({})).success);
    }

    #[test]
    fn test_no_schema_accepts() {
        let def = ToolDefinition::new("free");
        assert!(SchemaValidator::new().validate(&def, json!(null)).success);
    }
}
