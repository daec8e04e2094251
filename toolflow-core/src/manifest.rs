//! Tool manifests
//!
//! A manifest lists tool definitions in TOML or JSON so a tool catalogue can
//! live outside the code. Each entry may carry a `simulate` block describing
//! canned behaviour (latency, failing attempts, output), which
//! [`Manifest::simulated_executors`] turns into executors for dry runs.
//!
//! ```toml
//! [[tools]]
//! name = "fetch"
//! timeout = "2s"
//! cost_estimate = 1.5
//!
//! [tools.simulate]
//! latency = "150ms"
//! fail_attempts = 1
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, ToolflowError};
use crate::tools::{ToolContext, ToolDefinition, ToolError, ToolErrorKind, ToolExecutor, ToolExecutors};

/// Canned behaviour for a simulated tool
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSpec {
    /// Time each attempt takes
    #[serde(with = "humantime_serde")]
    pub latency: Duration,

    /// Number of leading attempts that fail
    pub fail_attempts: u32,

    /// Value returned on success (defaults to an echo of the call)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTool {
    #[serde(flatten)]
    pub definition: ToolDefinition,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulate: Option<SimulationSpec>,
}

/// A catalogue of tool definitions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tools: Vec<ManifestTool>,
}

impl Manifest {
    /// Parse a TOML manifest
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(source)
            .map_err(|e| ToolflowError::Manifest(format!("Invalid TOML manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a JSON manifest
    pub fn from_json_str(source: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(source)
            .map_err(|e| ToolflowError::Manifest(format!("Invalid JSON manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check values the parsers accept but a budget cannot use
    ///
    /// # Errors
    ///
    /// Returns an error naming the first tool whose `cost_estimate` is
    /// negative, NaN or infinite.
    pub fn validate(&self) -> Result<()> {
        for definition in self.definitions() {
            let cost = definition.cost_estimate;
            if !cost.is_finite() || cost < 0.0 {
                return Err(ToolflowError::Manifest(format!(
                    "Tool '{}' has invalid cost_estimate {}: must be finite and non-negative",
                    definition.name, cost
                )));
            }
        }
        Ok(())
    }

    /// Load a manifest, choosing the format by file extension (TOML unless `.json`)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let manifest = if is_json {
            Self::from_json_str(&source)?
        } else {
            Self::from_toml_str(&source)?
        };
        tracing::debug!(path = %path.display(), tools = manifest.tools.len(), "Loaded tool manifest");
        Ok(manifest)
    }

    /// All tool definitions
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    /// Build an executor for every tool, simulating the `simulate` block
    /// (or succeeding immediately when it is absent)
    pub fn simulated_executors(&self) -> ToolExecutors {
        let mut executors = ToolExecutors::new();
        for tool in &self.tools {
            let spec = tool.simulate.clone().unwrap_or_default();
            executors.insert(
                tool.definition.name.clone(),
                Arc::new(SimulatedExecutor::new(spec)),
            );
        }
        executors
    }
}

/// Executor that plays back a [`SimulationSpec`]
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    spec: SimulationSpec,
}

impl SimulatedExecutor {
    /// Create a simulated executor
    pub fn new(spec: SimulationSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ToolExecutor for SimulatedExecutor {
    async fn execute(&self, params: Value, ctx: &ToolContext) -> std::result::Result<Value, ToolError> {
        if !self.spec.latency.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.spec.latency) => {}
                _ = ctx.cancellation.cancelled() => {
                    return Err(ToolError::new(ToolErrorKind::Cancelled, "Simulation cancelled"));
                }
            }
        }

        if ctx.attempt < self.spec.fail_attempts {
            return Err(ToolError::execution(format!(
                "Simulated failure of '{}' on attempt {}",
                ctx.tool, ctx.attempt
            )));
        }

        Ok(self.spec.output.clone().unwrap_or_else(|| {
            serde_json::json!({
                "tool": ctx.tool,
                "attempt": ctx.attempt,
                "params": params,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const MANIFEST: &str = r#"
[[tools]]
name = "auth"
critical = true
max_retries = 0

[[tools]]
name = "fetch"
dependencies = ["auth"]
timeout = "2s"
cost_estimate = 1.5

[tools.simulate]
latency = "10ms"
fail_attempts = 1
output = { status = 200 }
"#;

    #[test]
    fn test_parse_toml() {
        let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
        assert_eq!(manifest.tools.len(), 2);

        let auth = &manifest.tools[0];
        assert!(auth.definition.critical);
        assert_eq!(auth.definition.max_retries, 0);
        assert!(auth.simulate.is_none());

        let fetch = &manifest.tools[1];
        assert_eq!(fetch.definition.dependencies, vec!["auth"]);
        assert_eq!(fetch.definition.timeout, Duration::from_secs(2));
        assert_eq!(fetch.definition.max_retries, 2);
        assert_eq!(fetch.definition.cost_estimate, 1.5);
        let simulate = fetch.simulate.as_ref().unwrap();
        assert_eq!(simulate.latency, Duration::from_millis(10));
        assert_eq!(simulate.fail_attempts, 1);
        assert_eq!(simulate.output, Some(json!({"status": 200})));
    }

    #[test]
    fn test_parse_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"tools": [{{"name": "a", "timeout": "500ms"}}, {{"name": "b", "dependencies": ["a"]}}]}}"#
        )
        .unwrap();

        let manifest = Manifest::from_file(file.path()).unwrap();
        let names: Vec<_> = manifest.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(manifest.tools[0].definition.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_manifest() {
        let err = Manifest::from_toml_str("[[tools]]\ndescription = 'no name'").unwrap_err();
        assert!(matches!(err, ToolflowError::Manifest(_)));
    }

    #[test]
    fn test_rejects_unusable_costs() {
        for cost in ["nan", "inf", "-5.0"] {
            let source = format!("[[tools]]\nname = \"refund\"\ncost_estimate = {cost}\n");
            let err = Manifest::from_toml_str(&source).unwrap_err();
            assert!(matches!(err, ToolflowError::Manifest(ref m) if m.contains("refund")), "{cost}: {err}");
        }

        let err = Manifest::from_json_str(r#"{"tools": [{"name": "refund", "cost_estimate": -1000.0}]}"#)
            .unwrap_err();
        assert!(matches!(err, ToolflowError::Manifest(_)));

        let free = Manifest::from_toml_str("[[tools]]\nname = \"free\"\ncost_estimate = 0.0\n");
        tokio_test::assert_ok!(free);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_executor_fails_then_succeeds() {
        let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
        let executors = manifest.simulated_executors();
        let fetch = executors.get("fetch").unwrap();

        let ctx = ToolContext::new("fetch", "u", "s");
        let first = fetch.execute(Value::Null, &ctx.for_attempt(0)).await;
        assert_eq!(first.unwrap_err().kind, ToolErrorKind::ExecutionFailed);

        let second = fetch.execute(Value::Null, &ctx.for_attempt(1)).await;
        assert_eq!(second.unwrap(), json!({"status": 200}));
    }

    #[tokio::test]
    async fn test_simulated_executor_echoes() {
        let executor = SimulatedExecutor::new(SimulationSpec::default());
        let ctx = ToolContext::new("echo", "u", "s");
        let value = executor.execute(json!({"q": 1}), &ctx).await.unwrap();
        assert_eq!(value["tool"], "echo");
        assert_eq!(value["params"], json!({"q": 1}));
    }

    #[tokio::test]
    async fn test_simulated_executor_honours_cancellation() {
        let executor = SimulatedExecutor::new(SimulationSpec {
            latency: Duration::from_secs(60),
            ..Default::default()
        });
        let ctx = ToolContext::new("slow", "u", "s");
        ctx.cancellation.cancel();
        let err = executor.execute(Value::Null, &ctx).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Cancelled);
    }
}
