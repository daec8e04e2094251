//! Tool execution records and the error taxonomy
//!
//! Provides:
//! - A tagged outcome envelope (success value or structured error)
//! - A unified error taxonomy with retryable vs terminal distinction
//! - Per-run execution records with per-attempt history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Outcome of a tool run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Tool produced a valid result within budget
    Success {
        /// The validated result
        value: Value,
    },

    /// Tool failed
    Failure {
        /// Structured error information
        error: ToolError,
    },
}

impl ToolOutcome {
    /// Check if this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    /// Get the value if successful
    pub fn value(&self) -> Option<&Value> {
        match self {
            ToolOutcome::Success { value } => Some(value),
            ToolOutcome::Failure { .. } => None,
        }
    }

    /// Get the error if failed
    pub fn error(&self) -> Option<&ToolError> {
        match self {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure { error } => Some(error),
        }
    }
}

/// Structured tool error with taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error kind (determines retryability)
    pub kind: ToolErrorKind,

    /// Human-readable error message
    pub message: String,

    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Add context
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// The tool has no registered definition
    pub fn not_registered(tool: &str) -> Self {
        Self::new(
            ToolErrorKind::ToolNotRegistered,
            format!("Tool '{}' is not registered", tool),
        )
    }

    /// No executor was supplied for the tool
    pub fn executor_missing(tool: &str) -> Self {
        Self::new(
            ToolErrorKind::ExecutorMissing,
            format!("No executor supplied for tool '{}'", tool),
        )
    }

    /// The guardrail refused the call
    pub fn rate_limited(user_id: &str) -> Self {
        Self::new(
            ToolErrorKind::RateLimitExceeded,
            format!("Rate limit exceeded for user '{}'", user_id),
        )
    }

    /// The attempt outlived its timeout
    pub fn timeout(duration: Duration) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("Tool execution timed out after {:?}", duration),
        )
    }

    /// The result did not have the expected shape
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ValidationFailure, message)
    }

    /// The executor itself reported an error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ExecutionFailed, message)
    }

    /// The session budget cannot cover the run
    pub fn budget_exceeded(cost: f64, remaining: f64) -> Self {
        Self::new(
            ToolErrorKind::CostBudgetExceeded,
            format!(
                "Cost budget exceeded: run cost {:.2}, remaining {:.2}",
                cost, remaining
            ),
        )
        .with_context(serde_json::json!({ "cost": cost, "remaining": remaining }))
    }

    /// Whether the invoker may try again after this error
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Tool has no definition (terminal)
    ToolNotRegistered,

    /// Caller supplied no executor (terminal)
    ExecutorMissing,

    /// Guardrail denied the call (terminal)
    RateLimitExceeded,

    /// Attempt outlived its timeout (retryable)
    Timeout,

    /// Result had the wrong shape (retryable)
    ValidationFailure,

    /// Executor returned an error (retryable)
    ExecutionFailed,

    /// Budget enforcement overrode a successful run (terminal)
    CostBudgetExceeded,

    /// Executor gave up because it was cancelled (terminal)
    Cancelled,
}

impl ToolErrorKind {
    /// Check if this error kind is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolErrorKind::Timeout
                | ToolErrorKind::ValidationFailure
                | ToolErrorKind::ExecutionFailed
        )
    }
}

/// Record of a single attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt index, starting at 0
    pub attempt: u32,

    /// Time spent in the attempt
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// Error kind if the attempt failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorKind>,
}

/// Record of one tool run across all its attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Tool name
    pub tool: String,

    /// Short hash of the params the tool was called with
    pub params_hash: String,

    /// When the first attempt started
    pub start_time: DateTime<Utc>,

    /// When the run was finalized
    pub end_time: Option<DateTime<Utc>>,

    /// Whether the last attempt succeeded
    pub success: bool,

    /// Attempts beyond the first
    pub retries: u32,

    /// Per-attempt history
    pub attempts: Vec<AttemptRecord>,

    /// Final outcome, set on finalization
    pub outcome: Option<ToolOutcome>,

    /// Cost charged for the run
    pub cost_actual: f64,
}

impl ToolExecution {
    /// Start a new record
    pub fn start(tool: impl Into<String>, params_hash: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params_hash: params_hash.into(),
            start_time: Utc::now(),
            end_time: None,
            success: false,
            retries: 0,
            attempts: Vec::new(),
            outcome: None,
            cost_actual: 0.0,
        }
    }

    /// Append an attempt
    pub fn record_attempt(&mut self, attempt: u32, duration: Duration, error: Option<ToolErrorKind>) {
        self.attempts.push(AttemptRecord {
            attempt,
            duration,
            error,
        });
        self.retries = attempt;
    }

    /// Finalize with the given outcome
    pub fn finish(&mut self, outcome: ToolOutcome) {
        self.success = outcome.is_success();
        self.outcome = Some(outcome);
        self.end_time = Some(Utc::now());
    }

    /// Wall-clock time between start and finalization
    pub fn duration(&self) -> Duration {
        self.end_time
            .map(|end| (end - self.start_time).to_std().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Result value if the run succeeded
    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().and_then(ToolOutcome::value)
    }

    /// Error if the run failed
    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().and_then(ToolOutcome::error)
    }

    /// Number of attempts made
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

// Serde helper for Duration serialization as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
