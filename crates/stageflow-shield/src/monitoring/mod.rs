//! Request monitoring.

pub mod metrics;

pub use metrics::{MetricsSnapshot, ShieldMetrics};
