//! Thread-safe request metrics — durations, outcomes, rolling averages.

use crate::model::{MetricsSnapshot, Outcome};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Duration;

/// Default number of recent durations kept for the rolling mean.
pub const DEFAULT_WINDOW: usize = 128;

/// Collects per-invocation timing from concurrent pipeline runs.
///
/// Thread-safe via `RwLock`. Share it with `Arc` and inject it into every
/// pipeline that should report into it.
pub struct RequestMetrics {
    window: usize,
    started_at: DateTime<Utc>,
    totals: RwLock<RunningTotals>,
}

/// Internal running totals.
#[derive(Debug, Default)]
struct RunningTotals {
    requests: u64,
    successes: u64,
    failures: u64,
    attempts: u64,
    total_ms: u64,
    recent_ms: VecDeque<u64>,
}

impl RequestMetrics {
    /// Create a collector with the default rolling window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create a collector keeping the last `window` durations.
    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(1),
            started_at: Utc::now(),
            totals: RwLock::new(RunningTotals::default()),
        }
    }

    /// Record one finished pipeline invocation.
    pub fn record(&self, elapsed: Duration, attempts: u32, outcome: Outcome) {
        let ms = elapsed.as_millis().min(u64::MAX as u128) as u64;
        let mut totals = match self.totals.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        totals.requests += 1;
        totals.attempts += attempts as u64;
        totals.total_ms = totals.total_ms.saturating_add(ms);
        match outcome {
            Outcome::Success => totals.successes += 1,
            Outcome::Failure => totals.failures += 1,
        }

        if totals.recent_ms.len() == self.window {
            totals.recent_ms.pop_front();
        }
        totals.recent_ms.push_back(ms);
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = match self.totals.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let rolling_mean_ms = mean(totals.recent_ms.iter().sum(), totals.recent_ms.len() as u64);
        let lifetime_mean_ms = mean(totals.total_ms, totals.requests);

        MetricsSnapshot {
            since: self.started_at,
            requests: totals.requests,
            successes: totals.successes,
            failures: totals.failures,
            attempts: totals.attempts,
            rolling_window: totals.recent_ms.len(),
            rolling_mean_ms,
            lifetime_mean_ms,
        }
    }
}

fn mean(sum: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}
