//! Tool Registry for definition storage and lookup
//!
//! The registry does no validation on registration: dependencies may name
//! tools that are registered later, and cycles only become observable once
//! every member is present. Both are reported by the planner instead.
//!
//! # Example
//!
//! ```rust
//! use toolflow_core::tools::{ToolDefinition, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(ToolDefinition::new("fetch"));
//! registry.register(ToolDefinition::new("summarize").depends_on("fetch"));
//!
//! assert!(registry.get("summarize").is_ok());
//! assert!(registry.get("translate").is_err());
//! ```

use super::definition::ToolDefinition;
use std::collections::HashMap;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No definition stored under this name
    NotRegistered(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NotRegistered(name) => {
                write!(f, "Tool '{}' is not registered", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Registry of tool definitions keyed by name
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition, replacing any previous one with the same name
    ///
    /// Returns the replaced definition, if there was one.
    pub fn register(&mut self, definition: ToolDefinition) -> Option<ToolDefinition> {
        let previous = self.tools.insert(definition.name.clone(), definition);
        if let Some(ref prev) = previous {
            tracing::debug!(tool = %prev.name, "Replaced tool definition");
        }
        previous
    }

    /// Register several definitions
    pub fn register_all(&mut self, definitions: impl IntoIterator<Item = ToolDefinition>) {
        for definition in definitions {
            self.register(definition);
        }
    }

    /// Remove a definition
    pub fn unregister(&mut self, name: &str) -> Option<ToolDefinition> {
        self.tools.remove(name)
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Result<&ToolDefinition, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterate over all definitions (unordered)
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
