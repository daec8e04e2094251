//! Single-tool invocation
//!
//! The invoker runs one tool under the full governance regime:
//! - Rate-limit check before every attempt (a denial stops the run)
//! - Executor lookup (a missing executor stops the run)
//! - Per-attempt timeout raced against the executor
//! - Response validation of the raw result
//! - Cost charging after a good result (budget overrides success)
//! - Exponential backoff between retryable failures
//!
//! Every attempt is reported to the profiler and the decision logger, and
//! the final outcome is reported to the decision logger.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::audit::{emit, DecisionAction, DecisionEvent, DecisionLogger, TracingDecisionLogger};
use crate::guardrail::{Guardrail, InMemoryGuardrail};
use crate::profiler::PerformanceProfiler;
use crate::retry::{RetryConfig, Sleeper, TokioSleeper};
use crate::tools::{
    ToolContext, ToolDefinition, ToolError, ToolExecution, ToolExecutor, ToolExecutors,
    ToolOutcome, ToolRegistry,
};
use crate::validation::{ResponseValidator, SchemaValidator};

/// How a single attempt ended
enum AttemptResult {
    /// Valid result, charged within budget
    Completed { value: Value, cost: f64 },
    /// Valid result the budget could not cover
    OverBudget { error: ToolError, cost: f64 },
    /// Anything else, including refusals before the executor ran
    Failed { error: ToolError },
}

/// Runs one tool with guardrails, timeout and retries
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<RwLock<ToolRegistry>>,
    profiler: PerformanceProfiler,
    guardrail: Arc<dyn Guardrail>,
    validator: Arc<dyn ResponseValidator>,
    logger: Arc<dyn DecisionLogger>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryConfig,
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ToolInvoker {
    /// Create an invoker with permissive collaborators
    pub fn new(registry: Arc<RwLock<ToolRegistry>>, profiler: PerformanceProfiler) -> Self {
        Self {
            registry,
            profiler,
            guardrail: Arc::new(InMemoryGuardrail::unlimited()),
            validator: Arc::new(SchemaValidator::new()),
            logger: Arc::new(TracingDecisionLogger),
            sleeper: Arc::new(TokioSleeper),
            retry: RetryConfig::default(),
        }
    }

    /// Builder: set the guardrail
    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrail = guardrail;
        self
    }

    /// Builder: set the response validator
    pub fn with_validator(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Builder: set the decision logger
    pub fn with_logger(mut self, logger: Arc<dyn DecisionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Builder: set the sleeper used for backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Builder: set the retry configuration
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get the decision logger
    pub fn logger(&self) -> &Arc<dyn DecisionLogger> {
        &self.logger
    }

    /// Get the retry configuration
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Run a tool to completion
    ///
    /// Never returns an error: every failure mode ends up in the returned
    /// record's outcome.
    pub async fn invoke(
        &self,
        name: &str,
        executors: &ToolExecutors,
        params: &Value,
        ctx: &ToolContext,
    ) -> ToolExecution {
        let mut execution = ToolExecution::start(name, hash_params(params));

        let definition = {
            let registry = self.registry.read().await;
            registry.get(name).cloned()
        };
        let definition = match definition {
            Ok(definition) => definition,
            Err(_) => {
                let error = ToolError::not_registered(name);
                tracing::warn!(tool = %name, "Invocation of unregistered tool");
                self.finish(&mut execution, ToolOutcome::Failure { error }, 0.0)
                    .await;
                return execution;
            }
        };

        let executor = executors.get(name);
        let max_attempts = definition.max_attempts();
        let mut attempt: u32 = 0;

        let outcome = loop {
            let attempt_ctx = ctx.for_attempt(attempt);
            let started = Instant::now();
            let result = self
                .attempt(&definition, executor.as_deref(), params, &attempt_ctx)
                .await;
            let elapsed = started.elapsed();

            match result {
                AttemptResult::Completed { value, cost } => {
                    execution.record_attempt(attempt, elapsed, None);
                    execution.cost_actual = cost;
                    self.profiler.record(name, elapsed, true).await;
                    self.log_attempt(&definition, attempt, elapsed, None).await;
                    break ToolOutcome::Success { value };
                }
                AttemptResult::OverBudget { error, cost } => {
                    execution.record_attempt(attempt, elapsed, Some(error.kind));
                    execution.cost_actual = cost;
                    self.profiler.record(name, elapsed, false).await;
                    self.log_attempt(&definition, attempt, elapsed, Some(&error)).await;
                    break ToolOutcome::Failure { error };
                }
                AttemptResult::Failed { error } => {
                    execution.record_attempt(attempt, elapsed, Some(error.kind));
                    self.profiler.record(name, elapsed, false).await;
                    self.log_attempt(&definition, attempt, elapsed, Some(&error)).await;

                    if error.is_retryable() && attempt + 1 < max_attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        tracing::warn!(
                            tool = %name,
                            attempt,
                            error = %error,
                            delay_ms = delay.as_millis() as u64,
                            "Tool attempt failed, retrying"
                        );
                        self.sleeper.sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    break ToolOutcome::Failure { error };
                }
            }
        };

        let cost = execution.cost_actual;
        self.finish(&mut execution, outcome, cost).await;
        execution
    }

    async fn attempt(
        &self,
        definition: &ToolDefinition,
        executor: Option<&dyn ToolExecutor>,
        params: &Value,
        ctx: &ToolContext,
    ) -> AttemptResult {
        let rate = self.guardrail.check_rate_limit(&ctx.user_id).await;
        if !rate.allowed {
            return AttemptResult::Failed {
                error: ToolError::rate_limited(&ctx.user_id),
            };
        }

        let Some(executor) = executor else {
            return AttemptResult::Failed {
                error: ToolError::executor_missing(&definition.name),
            };
        };

        tracing::debug!(
            tool = %definition.name,
            attempt = ctx.attempt,
            rate_remaining = rate.remaining,
            "Starting tool attempt"
        );

        let raw = match tokio::time::timeout(
            definition.timeout,
            executor.execute(params.clone(), ctx),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => return AttemptResult::Failed { error },
            Err(_) => {
                ctx.cancellation.cancel();
                return AttemptResult::Failed {
                    error: ToolError::timeout(definition.timeout),
                };
            }
        };

        let validated = self.validator.validate(definition, raw);
        if !validated.success {
            let message = validated
                .error
                .unwrap_or_else(|| format!("Result of '{}' failed validation", definition.name));
            return AttemptResult::Failed {
                error: ToolError::validation(message),
            };
        }
        let value = validated.data.unwrap_or_default();

        let cost = definition.cost_estimate;
        let budget = self
            .guardrail
            .track_cost(&ctx.user_id, &ctx.session_id, cost)
            .await;
        if !budget.within_budget {
            tracing::warn!(
                tool = %definition.name,
                cost,
                remaining = budget.remaining,
                "Cost budget exceeded after successful run"
            );
            return AttemptResult::OverBudget {
                error: ToolError::budget_exceeded(cost, budget.remaining),
                cost,
            };
        }

        AttemptResult::Completed { value, cost }
    }

    async fn log_attempt(
        &self,
        definition: &ToolDefinition,
        attempt: u32,
        duration: Duration,
        error: Option<&ToolError>,
    ) {
        let reason = match error {
            Some(error) => format!("attempt {} failed: {}", attempt, error),
            None => format!("attempt {} succeeded", attempt),
        };
        let event = DecisionEvent::new(DecisionAction::ToolCall, reason)
            .with_tool(&definition.name)
            .with_cost_estimate(definition.cost_estimate)
            .with_duration(duration)
            .with_success(error.is_none())
            .with_metadata(serde_json::json!({
                "attempt": attempt,
                "error_kind": error.map(|e| e.kind),
            }));
        emit(self.logger.as_ref(), event).await;
    }

    async fn finish(&self, execution: &mut ToolExecution, outcome: ToolOutcome, cost: f64) {
        execution.finish(outcome);

        let (action, reason) = match execution.error() {
            None => (DecisionAction::Completion, "tool completed".to_string()),
            Some(error) => (DecisionAction::Error, error.to_string()),
        };

        if execution.success {
            tracing::debug!(tool = %execution.tool, retries = execution.retries, "Tool completed");
        } else {
            tracing::warn!(tool = %execution.tool, retries = execution.retries, reason = %reason, "Tool failed");
        }

        let event = DecisionEvent::new(action, reason)
            .with_tool(&execution.tool)
            .with_cost_actual(cost)
            .with_duration(execution.duration())
            .with_success(execution.success)
            .with_metadata(serde_json::json!({ "retries": execution.retries }));
        emit(self.logger.as_ref(), event).await;
    }
}

/// Short, stable hash of call parameters
pub(crate) fn hash_params(params: &Value) -> String {
    let json = serde_json::to_string(params).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
