//! Rate-limit and cost guardrails
//!
//! The invoker consults a [`Guardrail`] before every attempt (rate limit)
//! and after every operationally successful attempt (cost). Both kinds of
//! state are per tenant: rate limits are keyed by user, budgets by
//! `(user, session)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Answer to a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the call may proceed
    pub allowed: bool,

    /// Calls left in the current window
    pub remaining: u64,
}

/// Answer to a cost charge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostDecision {
    /// Whether the charge fit in the budget
    pub within_budget: bool,

    /// Budget left after the charge (or before it, if rejected)
    pub remaining: f64,
}

/// External rate-limit and cost-tracking service
#[async_trait]
pub trait Guardrail: Send + Sync {
    /// Check and consume one call for a user
    async fn check_rate_limit(&self, user_id: &str) -> RateLimitDecision;

    /// Charge an amount against a user's session budget
    ///
    /// Negative and non-finite amounts must be rejected without charging.
    async fn track_cost(&self, user_id: &str, session_id: &str, amount: f64) -> CostDecision;
}

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum calls per window
    pub max_requests: u64,

    /// Window duration
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Guardrail configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Per-user rate limit (unlimited when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    /// Per-session budget (unlimited when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_budget: Option<f64>,
}

impl GuardrailConfig {
    /// Builder: set the rate limit
    pub fn with_rate_limit(mut self, max_requests: u64, window: Duration) -> Self {
        self.rate_limit = Some(RateLimitConfig {
            max_requests,
            window,
        });
        self
    }

    /// Builder: set the session budget
    pub fn with_session_budget(mut self, budget: f64) -> Self {
        self.session_budget = Some(budget);
        self
    }
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    count: u64,
}

#[derive(Debug, Default)]
struct GuardrailState {
    windows: HashMap<String, WindowState>,
    spent: HashMap<(String, String), f64>,
}

/// In-process guardrail with fixed-window rate limits and session budgets
#[derive(Debug, Clone, Default)]
pub struct InMemoryGuardrail {
    config: GuardrailConfig,
    state: Arc<Mutex<GuardrailState>>,
}

impl InMemoryGuardrail {
    /// Create a guardrail
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(GuardrailState::default())),
        }
    }

    /// Guardrail that never refuses
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Get the configuration
    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Amount already charged to a session
    pub async fn spent(&self, user_id: &str, session_id: &str) -> f64 {
        let state = self.state.lock().await;
        state
            .spent
            .get(&(user_id.to_string(), session_id.to_string()))
            .copied()
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl Guardrail for InMemoryGuardrail {
    async fn check_rate_limit(&self, user_id: &str) -> RateLimitDecision {
        let Some(ref limit) = self.config.rate_limit else {
            return RateLimitDecision {
                allowed: true,
                remaining: u64::MAX,
            };
        };

        let mut state = self.state.lock().await;
        let window = state
            .windows
            .entry(user_id.to_string())
            .or_insert_with(|| WindowState {
                started: Instant::now(),
                count: 0,
            });

        if window.started.elapsed() >= limit.window {
            window.started = Instant::now();
            window.count = 0;
        }

        if window.count >= limit.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: limit.max_requests - window.count,
        }
    }

    async fn track_cost(&self, user_id: &str, session_id: &str, amount: f64) -> CostDecision {
        let mut state = self.state.lock().await;
        let spent = state
            .spent
            .entry((user_id.to_string(), session_id.to_string()))
            .or_insert(0.0);

        if !amount.is_finite() || amount < 0.0 {
            tracing::warn!(
                user = %user_id,
                session = %session_id,
                amount,
                "Rejected invalid cost amount"
            );
            return CostDecision {
                within_budget: false,
                remaining: self
                    .config
                    .session_budget
                    .map_or(f64::INFINITY, |budget| budget - *spent),
            };
        }

        let Some(budget) = self.config.session_budget else {
            *spent += amount;
            return CostDecision {
                within_budget: true,
                remaining: f64::INFINITY,
            };
        };

        let remaining = budget - *spent;
        if amount > remaining {
            return CostDecision {
                within_budget: false,
                remaining,
            };
        }

        *spent += amount;
        CostDecision {
            within_budget: true,
            remaining: budget - *spent,
        }
    }
}
