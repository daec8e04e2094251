//! Error types for Toolflow operations

/// Result type for Toolflow operations
pub type Result<T> = std::result::Result<T, ToolflowError>;

/// Error types for the Toolflow orchestrator
#[derive(Debug, thiserror::Error)]
pub enum ToolflowError {
    /// Tool lookup failed
    #[error("Registry error: {0}")]
    Registry(#[from] crate::tools::RegistryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tool manifest could not be parsed
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Decision logger sink failed
    #[error("Decision log error: {0}")]
    DecisionLog(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ToolflowError {
    fn from(s: String) -> Self {
        ToolflowError::Other(s)
    }
}

impl From<&str> for ToolflowError {
    fn from(s: &str) -> Self {
        ToolflowError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolflowError {
    fn from(err: anyhow::Error) -> Self {
        ToolflowError::Other(err.to_string())
    }
}
