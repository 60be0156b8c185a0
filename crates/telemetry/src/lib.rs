//! Request timing and outcome metrics for npcmind.
//!
//! Provides a thread-safe collector that concurrent pipeline invocations
//! report into. There is no global instance; callers create one, wrap it in
//! an `Arc`, and inject it.

pub mod metrics;
pub mod model;

pub use metrics::RequestMetrics;
pub use model::{MetricsSnapshot, Outcome};
