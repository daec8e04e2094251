//! Configuration types for the Toolflow orchestrator

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolflowError};
use crate::guardrail::GuardrailConfig;
use crate::profiler::ProfilerConfig;
use crate::retry::RetryConfig;
use crate::safe_mode::SafeModeOptions;

/// Main configuration for an orchestrator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Backoff between attempts
    pub retry: RetryConfig,

    /// Performance profiler window and thresholds
    pub profiler: ProfilerConfig,

    /// Safe mode circuit breaker
    pub safe_mode: SafeModeOptions,

    /// Built-in guardrail limits
    pub guardrail: GuardrailConfig,

    /// Finished tool runs kept for `recent_executions`
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            profiler: ProfilerConfig::default(),
            safe_mode: SafeModeOptions::default(),
            guardrail: GuardrailConfig::default(),
            history_limit: 1000,
        }
    }
}

impl OrchestratorConfig {
    /// Builder: set retry configuration
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set profiler configuration
    pub fn with_profiler(mut self, profiler: ProfilerConfig) -> Self {
        self.profiler = profiler;
        self
    }

    /// Builder: set safe mode options
    pub fn with_safe_mode(mut self, safe_mode: SafeModeOptions) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    /// Builder: set guardrail limits
    pub fn with_guardrail(mut self, guardrail: GuardrailConfig) -> Self {
        self.guardrail = guardrail;
        self
    }

    /// Builder: set history size
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `toolflow.toml` in the working directory
    /// 3. Environment overrides, e.g. `TOOLFLOW_SAFE_MODE__MAX_FAILURES=5`
    /// 4. The file named by `TOOLFLOW_CONFIG_PATH`, if set
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or the merged
    /// configuration fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(OrchestratorConfig::default()))
            .merge(Toml::file("toolflow.toml"))
            .merge(
                Env::prefixed("TOOLFLOW_")
                    .ignore(&["CONFIG_PATH"])
                    .split("__"),
            );

        if let Ok(path) = std::env::var("TOOLFLOW_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: OrchestratorConfig = figment.extract().map_err(|e| {
            ToolflowError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolflowError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: OrchestratorConfig =
            Figment::from(Serialized::defaults(OrchestratorConfig::default()))
                .merge(Toml::file(path))
                .extract()
                .map_err(|e| {
                    ToolflowError::Configuration(format!(
                        "Failed to load configuration file: {}",
                        e
                    ))
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first nonsensical value found.
    pub fn validate(&self) -> Result<()> {
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ToolflowError::Configuration(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ToolflowError::Configuration(
                "retry.max_delay must not be shorter than retry.base_delay".into(),
            ));
        }
        if self.profiler.window_size == 0 {
            return Err(ToolflowError::Configuration(
                "profiler.window_size must be positive".into(),
            ));
        }
        let (degraded, unhealthy) = (
            self.profiler.degraded_threshold,
            self.profiler.unhealthy_threshold,
        );
        if !(0.0..=1.0).contains(&degraded)
            || !(0.0..=1.0).contains(&unhealthy)
            || degraded > unhealthy
        {
            return Err(ToolflowError::Configuration(
                "profiler thresholds must satisfy 0 <= degraded <= unhealthy <= 1".into(),
            ));
        }
        if self.safe_mode.max_failures == 0 {
            return Err(ToolflowError::Configuration(
                "safe_mode.max_failures must be positive".into(),
            ));
        }
        if let Some(budget) = self.guardrail.session_budget
            && (budget.is_nan() || budget < 0.0)
        {
            return Err(ToolflowError::Configuration(
                "guardrail.session_budget must be non-negative".into(),
            ));
        }
        if let Some(ref limit) = self.guardrail.rate_limit
            && limit.window.is_zero()
        {
            return Err(ToolflowError::Configuration(
                "guardrail.rate_limit.window must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe_mode::FailoverStrategy;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_is_valid() {
        tokio_test::assert_ok!(OrchestratorConfig::default().validate());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
history_limit = 50

[retry]
base_delay = "250ms"

[safe_mode]
max_failures = 5
failover_strategy = "skip"

[guardrail]
session_budget = 300.0

[guardrail.rate_limit]
max_requests = 10
window = "1m"
"#
        )
        .unwrap();

        let config = OrchestratorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert_eq!(config.safe_mode.max_failures, 5);
        assert_eq!(config.safe_mode.failover_strategy, FailoverStrategy::Skip);
        assert!(config.safe_mode.auto_rollback);
        assert_eq!(config.guardrail.session_budget, Some(300.0));
        assert_eq!(
            config.guardrail.rate_limit.unwrap().window,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = OrchestratorConfig::from_file("/nonexistent/toolflow.toml").unwrap_err();
        assert!(matches!(err, ToolflowError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = OrchestratorConfig::default();
        config.profiler.degraded_threshold = 0.8;
        config.profiler.unhealthy_threshold = 0.5;
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_validate_rejects_zero_failures() {
        let mut config = OrchestratorConfig::default();
        config.safe_mode.max_failures = 0;
        assert!(config.validate().is_err());
    }
}
