//! End-to-end tests for the orchestrator
//!
//! These exercise planning, invocation and plan execution together through
//! the public `ToolOrchestrator` API.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toolflow_core::prelude::*;

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn succeed(executors: ToolExecutors, tool: &str) -> ToolExecutors {
    executors.with_fn(tool, |_params, ctx| async move { Ok(json!({ "tool": ctx.tool })) })
}

fn always_fail(executors: ToolExecutors, tool: &str) -> ToolExecutors {
    executors.with_fn(tool, |_params, _ctx| async move {
        Err(ToolError::execution("service unavailable"))
    })
}

async fn abc_orchestrator(config: OrchestratorConfig) -> ToolOrchestrator {
    let orchestrator = ToolOrchestrator::builder()
        .config(config)
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build()
        .unwrap();
    orchestrator
        .register_tools([
            ToolDefinition::new("A"),
            ToolDefinition::new("B").depends_on("A"),
            ToolDefinition::new("C").depends_on("A"),
        ])
        .await;
    orchestrator
}

#[tokio::test]
async fn test_scenario_plan_pulls_in_shared_dependency() {
    let orchestrator = abc_orchestrator(OrchestratorConfig::default()).await;

    let outcome = orchestrator.plan_execution(&["B", "C"]).await;
    assert!(outcome.valid);
    let plan = outcome.plan.unwrap();

    assert_eq!(plan.order[0], "A");
    assert_eq!(plan.parallel_groups.len(), 2);
    assert_eq!(plan.parallel_groups[0], vec!["A"]);
    let second: HashSet<_> = plan.parallel_groups[1].iter().map(String::as_str).collect();
    assert_eq!(second, HashSet::from(["B", "C"]));

    let executors = succeed(succeed(succeed(ToolExecutors::new(), "A"), "B"), "C");
    let result = orchestrator
        .execute_plan(&plan, &executors, "alice", "s1", &json!({}))
        .await;

    assert!(result.success);
    assert_eq!(result.results.len(), 3);
    assert_eq!(result.value("B"), Some(&json!({"tool": "B"})));
}

#[tokio::test]
async fn test_cycle_yields_no_plan() {
    let orchestrator = ToolOrchestrator::new();
    orchestrator
        .register_tools([
            ToolDefinition::new("x").depends_on("y"),
            ToolDefinition::new("y").depends_on("x"),
            ToolDefinition::new("z"),
        ])
        .await;

    let outcome = orchestrator.plan_execution(&["z", "x"]).await;
    assert!(!outcome.valid);
    assert!(outcome.plan.is_none());
    assert!(outcome.issues.iter().any(|issue| matches!(
        issue,
        PlanningIssue::CircularDependency { cycle } if cycle.contains(&"x".to_string())
            && cycle.contains(&"y".to_string())
    )));
}

#[tokio::test]
async fn test_unknown_and_missing_dependencies_reported_together() {
    let orchestrator = ToolOrchestrator::new();
    orchestrator
        .register_tool(ToolDefinition::new("report").depends_on("ledger"))
        .await;

    let outcome = orchestrator.plan_execution(&["report", "ghost"]).await;
    assert!(!outcome.valid);
    assert_eq!(outcome.issues.len(), 2);
}

#[tokio::test]
async fn test_retry_count_and_backoff_delays() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let orchestrator = ToolOrchestrator::builder()
        .config(
            OrchestratorConfig::default()
                .with_retry(RetryConfig::default().with_base_delay(Duration::from_millis(100))),
        )
        .sleeper(sleeper.clone())
        .build()
        .unwrap();
    orchestrator
        .register_tool(ToolDefinition::new("flaky").with_max_retries(2))
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let executors = ToolExecutors::new().with_fn("flaky", move |_params, _ctx| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ToolError::execution("nope"))
        }
    });

    let plan = orchestrator.plan_execution(&["flaky"]).await.plan.unwrap();
    let result = orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;

    let execution = &result.results["flaky"];
    assert!(!execution.success);
    assert_eq!(execution.retries, 2);
    assert_eq!(execution.attempt_count(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert_eq!(result.failures, vec!["flaky"]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_before_slow_executor() {
    let orchestrator = ToolOrchestrator::new();
    orchestrator
        .register_tool(
            ToolDefinition::new("slow")
                .with_timeout(Duration::from_millis(50))
                .with_max_retries(0),
        )
        .await;
    let executors = ToolExecutors::new().with_fn("slow", |_params, _ctx| async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(json!("too late"))
    });

    let plan = orchestrator.plan_execution(&["slow"]).await.plan.unwrap();
    let started = tokio::time::Instant::now();
    let result = orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;
    let elapsed = started.elapsed();

    let execution = &result.results["slow"];
    assert_eq!(execution.error().unwrap().kind, ToolErrorKind::Timeout);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(500));
}

#[tokio::test]
async fn test_budget_overrides_operational_success() {
    let orchestrator = ToolOrchestrator::builder()
        .config(
            OrchestratorConfig::default()
                .with_guardrail(GuardrailConfig::default().with_session_budget(300.0)),
        )
        .build()
        .unwrap();
    orchestrator
        .register_tool(ToolDefinition::new("premium").with_cost_estimate(500.0))
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let executors = ToolExecutors::new().with_fn("premium", move |_params, _ctx| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"answer": 42}))
        }
    });

    let plan = orchestrator.plan_execution(&["premium"]).await.plan.unwrap();
    let result = orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;

    let execution = &result.results["premium"];
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!execution.success);
    assert_eq!(
        execution.error().unwrap().kind,
        ToolErrorKind::CostBudgetExceeded
    );
    assert!(!result.success);
}

#[tokio::test]
async fn test_negative_cost_cannot_extend_budget() {
    let orchestrator = ToolOrchestrator::builder()
        .config(
            OrchestratorConfig::default()
                .with_guardrail(GuardrailConfig::default().with_session_budget(300.0)),
        )
        .build()
        .unwrap();
    orchestrator
        .register_tools([
            ToolDefinition::new("refund").with_cost_estimate(-1000.0),
            ToolDefinition::new("big")
                .depends_on("refund")
                .with_cost_estimate(900.0),
        ])
        .await;
    let executors = succeed(succeed(ToolExecutors::new(), "refund"), "big");

    let plan = orchestrator.plan_execution(&["big"]).await.plan.unwrap();
    let result = orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;

    for tool in ["refund", "big"] {
        let execution = &result.results[tool];
        assert!(!execution.success, "{tool} should not fit the budget");
        assert_eq!(
            execution.error().unwrap().kind,
            ToolErrorKind::CostBudgetExceeded
        );
    }
    assert!(!result.success);
    assert_eq!(result.failures, vec!["refund", "big"]);
}

#[tokio::test]
async fn test_safe_mode_abort_stops_later_groups() {
    let config = OrchestratorConfig::default().with_safe_mode(
        SafeModeOptions::default()
            .with_max_failures(1)
            .with_failover_strategy(FailoverStrategy::Abort),
    );
    let orchestrator = abc_orchestrator(config).await;
    orchestrator
        .register_tool(ToolDefinition::new("A").with_max_retries(0))
        .await;

    let ran_later = Arc::new(AtomicU32::new(0));
    let mut executors = always_fail(ToolExecutors::new(), "A");
    for tool in ["B", "C"] {
        let ran_later = ran_later.clone();
        executors = executors.with_fn(tool, move |_params, _ctx| {
            ran_later.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Value::Null) }
        });
    }

    let plan = orchestrator.plan_execution(&["B", "C"]).await.plan.unwrap();
    let result = orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;

    assert!(!result.success);
    assert_eq!(ran_later.load(Ordering::SeqCst), 0);
    assert_eq!(
        result.skipped.iter().cloned().collect::<HashSet<_>>(),
        HashSet::from(["B".to_string(), "C".to_string()])
    );
    assert!(matches!(
        result.aborted,
        Some(AbortReason::SafeModeTripped { failures: 1, max_failures: 1 })
    ));
}

#[tokio::test]
async fn test_health_classification_boundaries() {
    let orchestrator = ToolOrchestrator::new();
    let profiler = orchestrator.profiler();

    assert_eq!(
        orchestrator.get_performance_profile("edge").await.health,
        ToolHealth::Unknown
    );

    profiler.record("edge", Duration::from_millis(10), true).await;
    profiler.record("edge", Duration::from_millis(10), false).await;
    let profile = orchestrator.get_performance_profile("edge").await;
    assert_eq!(profile.failure_rate, 0.5);
    assert_eq!(profile.health, ToolHealth::Degraded);

    for success in [true, true, false, false, false] {
        profiler.record("bad", Duration::from_millis(10), success).await;
    }
    let profile = orchestrator.get_performance_profile("bad").await;
    assert!((profile.failure_rate - 0.6).abs() < 1e-9);
    assert_eq!(profile.health, ToolHealth::Unhealthy);
}

#[tokio::test]
async fn test_profiles_fed_by_execution() {
    let orchestrator = abc_orchestrator(OrchestratorConfig::default()).await;
    let executors = succeed(succeed(succeed(ToolExecutors::new(), "A"), "B"), "C");
    let plan = orchestrator.plan_execution(&["B"]).await.plan.unwrap();

    orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;

    let profile = orchestrator.get_performance_profile("A").await;
    assert_eq!(profile.samples, 1);
    assert_eq!(profile.health, ToolHealth::Healthy);
    assert_eq!(
        orchestrator.get_performance_profile("C").await.health,
        ToolHealth::Unknown
    );
}

#[tokio::test]
async fn test_decision_trail() {
    let logger = MemoryDecisionLogger::new();
    let orchestrator = ToolOrchestrator::builder()
        .logger(Arc::new(logger.clone()))
        .build()
        .unwrap();
    orchestrator
        .register_tools([
            ToolDefinition::new("a").with_cost_estimate(1.0),
            ToolDefinition::new("b").depends_on("a").with_cost_estimate(2.0),
        ])
        .await;
    let executors = succeed(succeed(ToolExecutors::new(), "a"), "b");
    let plan = orchestrator.plan_execution(&["b"]).await.plan.unwrap();

    let result = orchestrator
        .execute_plan(&plan, &executors, "u", "s", &Value::Null)
        .await;

    assert_eq!(result.total_cost(), 3.0);
    let events = logger.events().await;
    assert_eq!(events.first().unwrap().action, DecisionAction::TaskStart);
    assert_eq!(events.last().unwrap().action, DecisionAction::Completion);
    assert_eq!(events.last().unwrap().cost_actual, Some(3.0));
    assert_eq!(logger.events_of(DecisionAction::ToolCall).await.len(), 2);
}

#[tokio::test]
async fn test_manifest_driven_run() {
    let manifest = Manifest::from_toml_str(
        r#"
[[tools]]
name = "auth"

[[tools]]
name = "fetch"
dependencies = ["auth"]

[tools.simulate]
fail_attempts = 1
output = "payload"
"#,
    )
    .unwrap();

    let orchestrator = ToolOrchestrator::builder()
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build()
        .unwrap();
    orchestrator
        .register_tools(manifest.definitions().cloned())
        .await;

    let plan = orchestrator.plan_execution(&["fetch"]).await.plan.unwrap();
    let result = orchestrator
        .execute_plan(
            &plan,
            &manifest.simulated_executors(),
            "u",
            "s",
            &Value::Null,
        )
        .await;

    assert!(result.success);
    assert_eq!(result.results["fetch"].retries, 1);
    assert_eq!(result.value("fetch"), Some(&json!("payload")));
    assert_eq!(orchestrator.recent_executions(10).await.len(), 2);
}
