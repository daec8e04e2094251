//! Plan execution
//!
//! Runs an [`ExecutionPlan`] group by group. Members of a group are started
//! together and joined with all-settled semantics; groups never overlap.
//! Safe mode is consulted before each group, and a failed critical tool can
//! abort whatever is left of the plan.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::{emit, DecisionAction, DecisionEvent};
use crate::invoker::ToolInvoker;
use crate::planner::ExecutionPlan;
use crate::safe_mode::{GroupGate, SafeModeBreaker, SafeModeOptions};
use crate::tools::{ToolContext, ToolExecution, ToolExecutors, ToolRegistry};

/// Why a plan stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// Failure count reached the safe mode threshold
    SafeModeTripped { failures: u32, max_failures: u32 },
    /// A critical tool failed while auto rollback was on
    CriticalToolFailure { tool: String },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::SafeModeTripped {
                failures,
                max_failures,
            } => write!(
                f,
                "safe mode tripped after {} failures (max {})",
                failures, max_failures
            ),
            AbortReason::CriticalToolFailure { tool } => {
                write!(f, "critical tool '{}' failed", tool)
            }
        }
    }
}

/// Outcome of running a whole plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExecutionResult {
    /// Identifier shared by every tool context of this run
    pub trace_id: String,

    /// True only when no tool failed
    pub success: bool,

    /// Every tool that ran, keyed by name
    pub results: HashMap<String, ToolExecution>,

    /// Tools that ultimately failed, in completion order
    pub failures: Vec<String>,

    /// Tools never started because the plan was aborted
    pub skipped: Vec<String>,

    /// Set when the plan stopped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
}

impl PlanExecutionResult {
    /// Result value of a tool that succeeded
    pub fn value(&self, tool: &str) -> Option<&Value> {
        self.results.get(tool).and_then(ToolExecution::value)
    }

    /// Total cost charged across the run
    pub fn total_cost(&self) -> f64 {
        self.results.values().map(|e| e.cost_actual).sum()
    }
}

/// Per-call inputs shared by every tool in the plan
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub executors: &'a ToolExecutors,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub params: &'a Value,
}

/// Runs plans through a [`ToolInvoker`]
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    invoker: ToolInvoker,
    registry: Arc<RwLock<ToolRegistry>>,
    safe_mode: SafeModeOptions,
}

impl PlanExecutor {
    /// Create an executor
    pub fn new(
        invoker: ToolInvoker,
        registry: Arc<RwLock<ToolRegistry>>,
        safe_mode: SafeModeOptions,
    ) -> Self {
        Self {
            invoker,
            registry,
            safe_mode,
        }
    }

    /// Get the safe mode options
    pub fn safe_mode(&self) -> &SafeModeOptions {
        &self.safe_mode
    }

    /// Run every group of the plan
    pub async fn execute(&self, plan: &ExecutionPlan, request: RunRequest<'_>) -> PlanExecutionResult {
        let trace_id = Uuid::new_v4().to_string();
        let logger = self.invoker.logger().clone();
        let mut breaker = SafeModeBreaker::new(self.safe_mode.clone());

        tracing::info!(
            trace_id = %trace_id,
            user_id = %request.user_id,
            session_id = %request.session_id,
            tools = plan.len(),
            groups = plan.parallel_groups.len(),
            "Executing plan"
        );
        emit(
            logger.as_ref(),
            DecisionEvent::new(DecisionAction::TaskStart, "plan execution started")
                .with_tools(plan.order.iter().cloned())
                .with_cost_estimate(plan.estimated_cost)
                .with_metadata(serde_json::json!({
                    "trace_id": trace_id,
                    "groups": plan.parallel_groups,
                })),
        )
        .await;

        let mut results = HashMap::new();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        let mut aborted = None;

        for (index, group) in plan.parallel_groups.iter().enumerate() {
            if aborted.is_some() {
                skipped.extend(group.iter().cloned());
                continue;
            }

            match breaker.gate() {
                GroupGate::Proceed => {}
                GroupGate::Abort => {
                    let reason = AbortReason::SafeModeTripped {
                        failures: breaker.failure_count(),
                        max_failures: breaker.options().max_failures,
                    };
                    tracing::warn!(trace_id = %trace_id, group = index, %reason, "Aborting plan");
                    emit(
                        logger.as_ref(),
                        DecisionEvent::new(DecisionAction::Error, reason.to_string())
                            .with_tools(group.iter().cloned())
                            .with_success(false),
                    )
                    .await;
                    aborted = Some(reason);
                    skipped.extend(group.iter().cloned());
                    continue;
                }
                GroupGate::ProceedTripped(strategy) => {
                    tracing::warn!(
                        trace_id = %trace_id,
                        group = index,
                        failures = breaker.failure_count(),
                        ?strategy,
                        "Safe mode tripped, continuing"
                    );
                    emit(
                        logger.as_ref(),
                        DecisionEvent::new(
                            DecisionAction::Error,
                            format!("safe mode tripped, strategy {:?} continues", strategy),
                        )
                        .with_tools(group.iter().cloned())
                        .with_metadata(serde_json::json!({
                            "failures": breaker.failure_count(),
                            "strategy": strategy,
                        })),
                    )
                    .await;
                }
            }

            tracing::debug!(trace_id = %trace_id, group = index, tools = ?group, "Starting group");
            let executions = self.run_group(group, &trace_id, request).await;

            let critical: Vec<bool> = {
                let registry = self.registry.read().await;
                group
                    .iter()
                    .map(|tool| registry.get(tool).map(|d| d.critical).unwrap_or(false))
                    .collect()
            };

            for (execution, critical) in executions.into_iter().zip(critical) {
                if !execution.success {
                    breaker.record_failure();
                    failures.push(execution.tool.clone());
                    if critical && breaker.rolls_back_critical() && aborted.is_none() {
                        let reason = AbortReason::CriticalToolFailure {
                            tool: execution.tool.clone(),
                        };
                        tracing::warn!(trace_id = %trace_id, %reason, "Aborting plan");
                        aborted = Some(reason);
                    }
                }
                results.insert(execution.tool.clone(), execution);
            }
        }

        let success = failures.is_empty();
        let result = PlanExecutionResult {
            trace_id,
            success,
            results,
            failures,
            skipped,
            aborted,
        };

        tracing::info!(
            trace_id = %result.trace_id,
            success = result.success,
            failures = result.failures.len(),
            skipped = result.skipped.len(),
            "Plan finished"
        );
        let reason = match &result.aborted {
            Some(reason) => format!("plan aborted: {}", reason),
            None if success => "plan completed".to_string(),
            None => format!("plan completed with {} failures", result.failures.len()),
        };
        emit(
            logger.as_ref(),
            DecisionEvent::new(DecisionAction::Completion, reason)
                .with_tools(plan.order.iter().cloned())
                .with_cost_estimate(plan.estimated_cost)
                .with_cost_actual(result.total_cost())
                .with_success(success)
                .with_metadata(serde_json::json!({
                    "trace_id": result.trace_id,
                    "failures": result.failures,
                    "skipped": result.skipped,
                })),
        )
        .await;

        result
    }

    async fn run_group(
        &self,
        group: &[String],
        trace_id: &str,
        request: RunRequest<'_>,
    ) -> Vec<ToolExecution> {
        let invoker = &self.invoker;
        join_all(group.iter().map(|tool| async move {
            let ctx = ToolContext::new(tool, request.user_id, request.session_id)
                .with_trace_id(trace_id);
            invoker
                .invoke(tool, request.executors, request.params, &ctx)
                .await
        }))
        .await
    }
}
