//! Executor trait and per-call executor map
//!
//! Executors are the caller-supplied implementations of tools. The
//! orchestrator never knows what a tool does; it only calls the executor
//! registered under the tool's name for the current plan run.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::result::ToolError;

/// Context passed to every executor attempt
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Tool being executed
    pub tool: String,

    /// Acting user
    pub user_id: String,

    /// Session the call belongs to
    pub session_id: String,

    /// Identifier shared by every tool of one plan run
    pub trace_id: Option<String>,

    /// Attempt index, starting at 0
    pub attempt: u32,

    /// Cancelled when the attempt times out
    pub cancellation: CancellationToken,
}

impl ToolContext {
    /// Create a context for a user and session
    pub fn new(
        tool: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            trace_id: None,
            attempt: 0,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Copy of this context for a given attempt, with a fresh token
    pub fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            cancellation: CancellationToken::new(),
            ..self.clone()
        }
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Caller-supplied tool implementation
///
/// Executors should watch `ctx.cancellation` if they spawn work that
/// outlives their own future: the orchestrator drops the future on timeout
/// but cannot reach anything it does not own.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the tool once
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Adapter turning an async closure into a [`ToolExecutor`]
pub struct FnExecutor<F> {
    func: F,
}

impl<F> FnExecutor<F> {
    /// Wrap a closure
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        (self.func)(params, ctx.clone()).await
    }
}

/// Name to executor map supplied per plan run
#[derive(Clone, Default)]
pub struct ToolExecutors {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl std::fmt::Debug for ToolExecutors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.executors.keys().collect();
        names.sort();
        f.debug_struct("ToolExecutors").field("tools", &names).finish()
    }
}

impl ToolExecutors {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an executor
    pub fn insert(&mut self, tool: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.executors.insert(tool.into(), executor);
    }

    /// Builder: add an executor
    pub fn with(mut self, tool: impl Into<String>, executor: Arc<dyn ToolExecutor>) -> Self {
        self.insert(tool, executor);
        self
    }

    /// Builder: add a closure executor
    pub fn with_fn<F, Fut>(self, tool: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.with(tool, Arc::new(FnExecutor::new(func)))
    }

    /// Look up an executor
    pub fn get(&self, tool: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(tool).cloned()
    }

    /// Whether an executor exists for the tool
    pub fn contains(&self, tool: &str) -> bool {
        self.executors.contains_key(tool)
    }

    /// Number of executors
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
