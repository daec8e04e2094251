//! Per-tool performance profiling
//!
//! Keeps a bounded window of recent successful durations and a cumulative
//! failure count for every tool name. Profiles are diagnostic: they are
//! keyed by tool only, never by user, and live as long as the profiler.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Health classification derived from the failure rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolHealth {
    /// No history yet
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

/// Profiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Successful durations kept per tool
    pub window_size: usize,

    /// Failure rate above which a tool is degraded
    pub degraded_threshold: f64,

    /// Failure rate above which a tool is unhealthy
    pub unhealthy_threshold: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            degraded_threshold: 0.2,
            unhealthy_threshold: 0.5,
        }
    }
}

impl ProfilerConfig {
    /// Builder: set window size
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size.max(1);
        self
    }

    /// Classify a failure rate
    pub fn classify(&self, failure_rate: f64) -> ToolHealth {
        if failure_rate > self.unhealthy_threshold {
            ToolHealth::Unhealthy
        } else if failure_rate > self.degraded_threshold {
            ToolHealth::Degraded
        } else {
            ToolHealth::Healthy
        }
    }
}

/// Snapshot of a tool's empirical performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    /// Tool name
    pub tool: String,

    /// Mean of the successful durations in the window
    #[serde(with = "humantime_serde")]
    pub avg_duration: Duration,

    /// failures / (window samples + failures)
    pub failure_rate: f64,

    /// Classification of `failure_rate`
    pub health: ToolHealth,

    /// Successful durations currently in the window
    pub samples: usize,

    /// Cumulative failures
    pub failures: u64,
}

impl PerformanceProfile {
    fn unknown(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            avg_duration: Duration::ZERO,
            failure_rate: 0.0,
            health: ToolHealth::Unknown,
            samples: 0,
            failures: 0,
        }
    }
}

#[derive(Debug, Default)]
struct ProfileState {
    durations: VecDeque<Duration>,
    failures: u64,
}

/// Shared per-tool performance history
#[derive(Debug, Clone)]
pub struct PerformanceProfiler {
    config: ProfilerConfig,
    profiles: Arc<RwLock<HashMap<String, ProfileState>>>,
}

impl Default for PerformanceProfiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

impl PerformanceProfiler {
    /// Create a profiler
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Record one attempt outcome
    pub async fn record(&self, tool: &str, duration: Duration, success: bool) {
        let mut profiles = self.profiles.write().await;
        let state = profiles.entry(tool.to_string()).or_default();

        if success {
            state.durations.push_back(duration);
            while state.durations.len() > self.config.window_size {
                state.durations.pop_front();
            }
        } else {
            state.failures += 1;
        }
    }

    /// Derive the current profile for a tool
    pub async fn get_profile(&self, tool: &str) -> PerformanceProfile {
        let profiles = self.profiles.read().await;
        let Some(state) = profiles.get(tool) else {
            return PerformanceProfile::unknown(tool);
        };

        let samples = state.durations.len();
        let total = samples as u64 + state.failures;
        if total == 0 {
            return PerformanceProfile::unknown(tool);
        }

        let avg_duration = if samples == 0 {
            Duration::ZERO
        } else {
            state.durations.iter().sum::<Duration>() / samples as u32
        };
        let failure_rate = state.failures as f64 / total as f64;

        PerformanceProfile {
            tool: tool.to_string(),
            avg_duration,
            failure_rate,
            health: self.config.classify(failure_rate),
            samples,
            failures: state.failures,
        }
    }

    /// Names of every profiled tool, sorted
    pub async fn tools(&self) -> Vec<String> {
        let profiles = self.profiles.read().await;
        let mut names: Vec<String> = profiles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget a tool's history
    pub async fn reset(&self, tool: &str) {
        self.profiles.write().await.remove(tool);
    }
}
