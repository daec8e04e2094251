//! Safe mode circuit breaker
//!
//! Counts failed tools across one plan run and, once the count reaches
//! `max_failures`, gates every following group through the configured
//! [`FailoverStrategy`]. A fresh breaker is used for every plan run.

use serde::{Deserialize, Serialize};

/// Policy applied once safe mode has tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverStrategy {
    /// Stop processing further groups
    #[default]
    Abort,
    /// Record the decision and keep going
    Skip,
    /// Record the decision and keep going; a hook for callers that re-plan
    Retry,
}

/// Safe mode configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeModeOptions {
    /// Whether the breaker is armed
    pub enabled: bool,

    /// Abort the plan when a critical tool fails
    pub auto_rollback: bool,

    /// Failed tools tolerated in one plan run before tripping
    pub max_failures: u32,

    /// What to do once tripped
    pub failover_strategy: FailoverStrategy,
}

impl Default for SafeModeOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_rollback: true,
            max_failures: 3,
            failover_strategy: FailoverStrategy::Abort,
        }
    }
}

impl SafeModeOptions {
    /// Safe mode switched off entirely
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            auto_rollback: false,
            ..Default::default()
        }
    }

    /// Builder: arm or disarm the breaker
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: set auto rollback
    pub fn with_auto_rollback(mut self, auto_rollback: bool) -> Self {
        self.auto_rollback = auto_rollback;
        self
    }

    /// Builder: set failure threshold
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    /// Builder: set failover strategy
    pub fn with_failover_strategy(mut self, strategy: FailoverStrategy) -> Self {
        self.failover_strategy = strategy;
        self
    }
}

/// Verdict before starting a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupGate {
    /// Breaker not tripped
    Proceed,
    /// Tripped, but the strategy lets the group run
    ProceedTripped(FailoverStrategy),
    /// Tripped with the abort strategy
    Abort,
}

/// Per-run failure counter
#[derive(Debug, Clone)]
pub struct SafeModeBreaker {
    options: SafeModeOptions,
    failures: u32,
}

impl SafeModeBreaker {
    /// Create a breaker for one plan run
    pub fn new(options: SafeModeOptions) -> Self {
        Self {
            options,
            failures: 0,
        }
    }

    /// Get the options
    pub fn options(&self) -> &SafeModeOptions {
        &self.options
    }

    /// Record a failed tool
    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    /// Failures recorded so far
    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    /// Whether the threshold has been reached
    pub fn is_tripped(&self) -> bool {
        self.options.enabled && self.failures >= self.options.max_failures.max(1)
    }

    /// Decide whether the next group may start
    pub fn gate(&self) -> GroupGate {
        if !self.is_tripped() {
            return GroupGate::Proceed;
        }
        match self.options.failover_strategy {
            FailoverStrategy::Abort => GroupGate::Abort,
            strategy => GroupGate::ProceedTripped(strategy),
        }
    }

    /// Whether a failed critical tool should abort the plan
    pub fn rolls_back_critical(&self) -> bool {
        self.options.auto_rollback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_at_threshold() {
        let mut breaker = SafeModeBreaker::new(SafeModeOptions::default().with_max_failures(2));
        assert_eq!(breaker.gate(), GroupGate::Proceed);

        breaker.record_failure();
        assert_eq!(breaker.gate(), GroupGate::Proceed);

        breaker.record_failure();
        assert!(breaker.is_tripped());
        assert_eq!(breaker.gate(), GroupGate::Abort);
    }

    #[test]
    fn test_skip_and_retry_proceed() {
        for strategy in [FailoverStrategy::Skip, FailoverStrategy::Retry] {
            let mut breaker = SafeModeBreaker::new(
                SafeModeOptions::default()
                    .with_max_failures(1)
                    .with_failover_strategy(strategy),
            );
            breaker.record_failure();
            assert_eq!(breaker.gate(), GroupGate::ProceedTripped(strategy));
        }
    }

    #[test]
    fn test_disabled_never_trips() {
        let mut breaker = SafeModeBreaker::new(SafeModeOptions::disabled());
        for _ in 0..10 {
            breaker.record_failure();
        }
        assert!(!breaker.is_tripped());
        assert_eq!(breaker.gate(), GroupGate::Proceed);
        assert!(!breaker.rolls_back_critical());
    }

    #[test]
    fn test_zero_threshold_clamped() {
        let options = SafeModeOptions::default().with_max_failures(0);
        assert_eq!(options.max_failures, 1);
        assert!(!SafeModeBreaker::new(options).is_tripped());
    }

    #[test]
    fn test_strategy_deserialize() {
        let options: SafeModeOptions = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "auto_rollback": false,
            "max_failures": 1,
            "failover_strategy": "skip"
        }))
        .unwrap();
        assert_eq!(options.failover_strategy, FailoverStrategy::Skip);
    }
}
