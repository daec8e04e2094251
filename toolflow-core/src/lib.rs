//! # Toolflow - Dependency-Aware Tool Execution
//!
//! Toolflow decides in what order a set of interdependent tools may run,
//! which of them may run side by side, and then runs them under a governance
//! regime:
//! - Dependency planning with cycle and missing-dependency diagnostics
//! - Per-attempt timeouts and exponential-backoff retries
//! - Per-user rate limits and per-session cost budgets
//! - Structural validation of tool results
//! - A safe mode circuit breaker and critical-tool abort
//! - Per-tool performance profiles and an audit trail of decisions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolflow_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let orchestrator = ToolOrchestrator::builder().build()?;
//!     orchestrator
//!         .register_tools([
//!             ToolDefinition::new("auth").critical(true),
//!             ToolDefinition::new("fetch").depends_on("auth"),
//!         ])
//!         .await;
//!
//!     let outcome = orchestrator.plan_execution(&["fetch"]).await;
//!     let plan = outcome.plan.expect("valid plan");
//!
//!     let executors = ToolExecutors::new()
//!         .with_fn("auth", |_params, _ctx| async move { Ok(serde_json::json!("token")) })
//!         .with_fn("fetch", |params, _ctx| async move { Ok(params) });
//!
//!     let result = orchestrator
//!         .execute_plan(&plan, &executors, "user-1", "session-1", &serde_json::json!({}))
//!         .await;
//!     assert!(result.success);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Registry** ([`tools`]): static tool definitions keyed by name
//! - **Planner** ([`planner`]): topological order plus greedy concurrency groups
//! - **Invoker** ([`invoker`]): one tool, all attempts, all guardrails
//! - **Plan executor** ([`executor`]): groups in sequence, members concurrently
//! - **Profiler** ([`profiler`]): sliding-window health per tool

pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod guardrail;
pub mod invoker;
pub mod manifest;
pub mod orchestrator;
pub mod planner;
pub mod profiler;
pub mod retry;
pub mod safe_mode;
pub mod tools;
pub mod validation;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audit::{
        DecisionAction, DecisionEvent, DecisionLogger, MemoryDecisionLogger,
        TracingDecisionLogger,
    };
    pub use crate::config::OrchestratorConfig;
    pub use crate::error::{Result, ToolflowError};
    pub use crate::executor::{AbortReason, PlanExecutionResult};
    pub use crate::guardrail::{
        CostDecision, Guardrail, GuardrailConfig, InMemoryGuardrail, RateLimitConfig,
        RateLimitDecision,
    };
    pub use crate::manifest::{Manifest, ManifestTool, SimulatedExecutor, SimulationSpec};
    pub use crate::orchestrator::{OrchestratorBuilder, ToolOrchestrator};
    pub use crate::planner::{ExecutionPlan, ExecutionPlanner, PlanOutcome, PlanningIssue};
    pub use crate::profiler::{PerformanceProfile, PerformanceProfiler, ProfilerConfig, ToolHealth};
    pub use crate::retry::{RetryConfig, Sleeper, TokioSleeper};
    pub use crate::safe_mode::{FailoverStrategy, SafeModeOptions};
    pub use crate::tools::{
        FnExecutor, JsonType, OutputSchema, ToolContext, ToolDefinition, ToolError,
        ToolErrorKind, ToolExecution, ToolExecutor, ToolExecutors, ToolOutcome, ToolRegistry,
    };
    pub use crate::validation::{
        AcceptAllValidator, ResponseValidator, SchemaValidator, ValidationOutcome,
    };
}
