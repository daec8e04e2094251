//! Decision logging
//!
//! Every plan start, tool attempt and final outcome is reported to a
//! [`DecisionLogger`]. Logging is fire-and-forget from the orchestrator's
//! point of view: a sink error is traced and swallowed, never surfaced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::Result;

/// Actor role recorded on orchestrator events
pub const ORCHESTRATOR_ROLE: &str = "orchestrator";

/// Kind of decision being logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionAction {
    TaskStart,
    ToolCall,
    Completion,
    Error,
}

/// One audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// When the event was produced
    pub timestamp: DateTime<Utc>,

    /// Who made the decision
    pub actor_role: String,

    /// What kind of decision
    pub action: DecisionAction,

    /// Tools involved
    pub tools: Vec<String>,

    /// Expected cost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,

    /// Charged cost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_actual: Option<f64>,

    /// Time spent
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub duration: Option<Duration>,

    /// Whether the step succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Free-text explanation
    pub reason: String,

    /// Anything else worth keeping
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl DecisionEvent {
    /// Create an orchestrator event
    pub fn new(action: DecisionAction, reason: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_role: ORCHESTRATOR_ROLE.to_string(),
            action,
            tools: Vec::new(),
            cost_estimate: None,
            cost_actual: None,
            duration: None,
            success: None,
            reason: reason.into(),
            metadata: Value::Null,
        }
    }

    /// Set the tool involved
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    /// Set the tools involved
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Set the cost estimate
    pub fn with_cost_estimate(mut self, cost: f64) -> Self {
        self.cost_estimate = Some(cost);
        self
    }

    /// Set the actual cost
    pub fn with_cost_actual(mut self, cost: f64) -> Self {
        self.cost_actual = Some(cost);
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set the success flag
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Audit sink for orchestration decisions
#[async_trait]
pub trait DecisionLogger: Send + Sync {
    /// Record an event
    async fn log(&self, event: DecisionEvent) -> Result<()>;
}

/// Forward an event, tracing (and otherwise ignoring) sink failures
pub(crate) async fn emit(logger: &dyn DecisionLogger, event: DecisionEvent) {
    let action = event.action;
    if let Err(e) = logger.log(event).await {
        tracing::warn!(?action, error = %e, "Decision logger failed");
    }
}

/// Logger that writes events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDecisionLogger;

#[async_trait]
impl DecisionLogger for TracingDecisionLogger {
    async fn log(&self, event: DecisionEvent) -> Result<()> {
        let tools = event.tools.join(",");
        match event.action {
            DecisionAction::Error => tracing::warn!(
                actor = %event.actor_role,
                action = ?event.action,
                tools = %tools,
                reason = %event.reason,
                "decision"
            ),
            _ => tracing::debug!(
                actor = %event.actor_role,
                action = ?event.action,
                tools = %tools,
                success = ?event.success,
                cost = ?event.cost_actual,
                reason = %event.reason,
                "decision"
            ),
        }
        Ok(())
    }
}

/// Logger keeping events in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDecisionLogger {
    events: Arc<Mutex<Vec<DecisionEvent>>>,
}

impl MemoryDecisionLogger {
    /// Create an empty logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event logged so far
    pub async fn events(&self) -> Vec<DecisionEvent> {
        self.events.lock().await.clone()
    }

    /// Events of one kind
    pub async fn events_of(&self, action: DecisionAction) -> Vec<DecisionEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    /// Drop every event
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl DecisionLogger for MemoryDecisionLogger {
    async fn log(&self, event: DecisionEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
