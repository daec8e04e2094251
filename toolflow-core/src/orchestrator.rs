//! Orchestrator facade
//!
//! [`ToolOrchestrator`] owns one registry, one profiler and one call
//! history, and wires the planner, invoker and plan executor together.
//! Instances are independent: nothing is shared through globals.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::audit::{DecisionLogger, TracingDecisionLogger};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::executor::{PlanExecutionResult, PlanExecutor, RunRequest};
use crate::guardrail::{Guardrail, InMemoryGuardrail};
use crate::invoker::ToolInvoker;
use crate::planner::{ExecutionPlan, ExecutionPlanner, PlanOutcome};
use crate::profiler::{PerformanceProfile, PerformanceProfiler};
use crate::retry::{Sleeper, TokioSleeper};
use crate::tools::{ToolDefinition, ToolExecution, ToolExecutors, ToolRegistry};
use crate::validation::{ResponseValidator, SchemaValidator};

/// Dependency-aware tool execution orchestrator
#[derive(Debug, Clone)]
pub struct ToolOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<RwLock<ToolRegistry>>,
    profiler: PerformanceProfiler,
    executor: PlanExecutor,
    history: Arc<Mutex<VecDeque<ToolExecution>>>,
}

impl Default for ToolOrchestrator {
    fn default() -> Self {
        Self::from_parts(
            OrchestratorConfig::default(),
            Arc::new(InMemoryGuardrail::unlimited()),
            Arc::new(SchemaValidator::new()),
            Arc::new(TracingDecisionLogger),
            Arc::new(TokioSleeper),
        )
    }
}

impl ToolOrchestrator {
    /// Create an orchestrator with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building an orchestrator
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    fn from_parts(
        config: OrchestratorConfig,
        guardrail: Arc<dyn Guardrail>,
        validator: Arc<dyn ResponseValidator>,
        logger: Arc<dyn DecisionLogger>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let registry = Arc::new(RwLock::new(ToolRegistry::new()));
        let profiler = PerformanceProfiler::new(config.profiler.clone());
        let invoker = ToolInvoker::new(registry.clone(), profiler.clone())
            .with_guardrail(guardrail)
            .with_validator(validator)
            .with_logger(logger)
            .with_sleeper(sleeper)
            .with_retry(config.retry.clone());
        let executor = PlanExecutor::new(invoker, registry.clone(), config.safe_mode.clone());

        Self {
            config,
            registry,
            profiler,
            executor,
            history: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Shared handle to the tool registry
    pub fn registry(&self) -> Arc<RwLock<ToolRegistry>> {
        self.registry.clone()
    }

    /// Register (or replace) a tool definition
    pub async fn register_tool(&self, definition: ToolDefinition) {
        let name = definition.name.clone();
        let replaced = self.registry.write().await.register(definition);
        tracing::debug!(tool = %name, replaced = replaced.is_some(), "Registered tool");
    }

    /// Register several tool definitions
    pub async fn register_tools(&self, definitions: impl IntoIterator<Item = ToolDefinition>) {
        for definition in definitions {
            self.register_tool(definition).await;
        }
    }

    /// Plan a request against the current registry
    pub async fn plan_execution<S: AsRef<str>>(&self, tools: &[S]) -> PlanOutcome {
        let registry = self.registry.read().await;
        let outcome = ExecutionPlanner::new(&registry).plan(tools);
        if !outcome.valid {
            tracing::info!(issues = outcome.issues.len(), "Planning found issues");
        }
        outcome
    }

    /// Run a plan for one user and session
    ///
    /// Every tool receives the same `params`.
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        executors: &ToolExecutors,
        user_id: &str,
        session_id: &str,
        params: &Value,
    ) -> PlanExecutionResult {
        let request = RunRequest {
            executors,
            user_id,
            session_id,
            params,
        };
        let result = self.executor.execute(plan, request).await;
        self.remember(plan, &result).await;
        result
    }

    /// Performance profile of a tool
    pub async fn get_performance_profile(&self, tool: &str) -> PerformanceProfile {
        self.profiler.get_profile(tool).await
    }

    /// Get the profiler
    pub fn profiler(&self) -> &PerformanceProfiler {
        &self.profiler
    }

    /// Most recent finished tool runs, newest first
    pub async fn recent_executions(&self, limit: usize) -> Vec<ToolExecution> {
        self.history
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    async fn remember(&self, plan: &ExecutionPlan, result: &PlanExecutionResult) {
        let limit = self.config.history_limit;
        if limit == 0 {
            return;
        }
        // Completion order; ties keep plan order
        let mut finished: Vec<&ToolExecution> = plan
            .order
            .iter()
            .filter_map(|tool| result.results.get(tool))
            .collect();
        finished.sort_by_key(|execution| execution.end_time);

        let mut history = self.history.lock().await;
        history.extend(finished.into_iter().cloned());
        while history.len() > limit {
            history.pop_front();
        }
    }
}

/// Builder for [`ToolOrchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    guardrail: Option<Arc<dyn Guardrail>>,
    validator: Option<Arc<dyn ResponseValidator>>,
    logger: Option<Arc<dyn DecisionLogger>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl OrchestratorBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom guardrail instead of one built from the configuration
    pub fn guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    /// Set the response validator
    pub fn validator(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the decision logger
    pub fn logger(mut self, logger: Arc<dyn DecisionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the sleeper used for retry backoff
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn build(self) -> Result<ToolOrchestrator> {
        self.config.validate()?;

        let guardrail = self
            .guardrail
            .unwrap_or_else(|| Arc::new(InMemoryGuardrail::new(self.config.guardrail.clone())));
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(SchemaValidator::new()));
        let logger = self.logger.unwrap_or_else(|| Arc::new(TracingDecisionLogger));
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));

        Ok(ToolOrchestrator::from_parts(
            self.config,
            guardrail,
            validator,
            logger,
            sleeper,
        ))
    }
}
