//! Prometheus metrics and structured logging for ws-vwap.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for the transport and the VWAP engine
//! - Periodic statistics summary

pub mod error;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use stats::{StatsReporter, StatsSnapshot};
