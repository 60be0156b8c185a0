//! Data model for request metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a pipeline invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Point-in-time view of the collected metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// When the collector was created.
    pub since: DateTime<Utc>,
    /// Finished invocations.
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    /// Gateway attempts across all invocations.
    pub attempts: u64,
    /// Number of durations currently in the rolling window.
    pub rolling_window: usize,
    /// Mean duration over the rolling window.
    pub rolling_mean_ms: f64,
    /// Mean duration over every recorded invocation.
    pub lifetime_mean_ms: f64,
}

impl MetricsSnapshot {
    /// Fraction of invocations that succeeded (0.0 when none ran).
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.requests as f64
        }
    }
}
