//! Static tool definitions
//!
//! A [`ToolDefinition`] describes everything the orchestrator needs to plan
//! and govern a tool: what it depends on, how long it may run, how often it
//! may be retried and what it is expected to cost. The tool's behaviour lives
//! elsewhere, in a [`ToolExecutor`](super::ToolExecutor) supplied per call.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::schema::OutputSchema;

/// Metadata registered once per tool name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique key)
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tools that must settle before this one starts
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Whether an exhausted failure should abort the rest of the plan
    #[serde(default)]
    pub critical: bool,

    /// Per-attempt timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempts allowed beyond the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Expected cost of one successful run, in abstract currency units
    #[serde(default)]
    pub cost_estimate: f64,

    /// Expected shape of a successful result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<OutputSchema>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    2
}

impl ToolDefinition {
    /// Create a definition with default limits and no dependencies
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            dependencies: Vec::new(),
            critical: false,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            cost_estimate: 0.0,
            output_schema: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a dependency (duplicates are ignored)
    pub fn depends_on(mut self, tool: impl Into<String>) -> Self {
        let tool = tool.into();
        if !self.dependencies.contains(&tool) {
            self.dependencies.push(tool);
        }
        self
    }

    /// Add several dependencies
    pub fn with_dependencies<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tool in tools {
            self = self.depends_on(tool);
        }
        self
    }

    /// Mark the tool as critical
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the cost estimate
    pub fn with_cost_estimate(mut self, cost: f64) -> Self {
        self.cost_estimate = cost;
        self
    }

    /// Set the expected output schema
    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Total attempts the invoker may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
