//! # Utility Modules
//!
//! Supporting utilities for logging, timing and session counters.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Async timeout wrappers
//! - **Metrics**: Per-session traffic counters

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{MetricsSnapshot, SessionMetrics};
