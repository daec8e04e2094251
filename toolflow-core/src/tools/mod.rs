//! Tool definitions, registry, executors and results
//!
//! This module holds the data the orchestrator plans and governs:
//! - Static [`ToolDefinition`]s stored in a [`ToolRegistry`]
//! - Caller-supplied [`ToolExecutor`]s collected per run in [`ToolExecutors`]
//! - [`ToolExecution`] records with a tagged [`ToolOutcome`]
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use toolflow_core::tools::{ToolDefinition, ToolExecutors, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(
//!     ToolDefinition::new("fetch")
//!         .with_timeout(Duration::from_secs(5))
//!         .with_max_retries(2),
//! );
//!
//! let executors = ToolExecutors::new().with_fn("fetch", |_params, _ctx| async move {
//!     Ok(serde_json::json!({"status": 200}))
//! });
//! assert!(executors.contains("fetch"));
//! ```

mod definition;
mod executor;
mod registry;
mod result;
mod schema;

pub use definition::ToolDefinition;
pub use executor::{FnExecutor, ToolContext, ToolExecutor, ToolExecutors};
pub use registry::{RegistryError, ToolRegistry};
pub use result::{AttemptRecord, ToolError, ToolErrorKind, ToolExecution, ToolOutcome};
pub use schema::{JsonType, OutputSchema, SchemaViolation};
