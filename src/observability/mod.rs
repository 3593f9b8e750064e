//! Observability for the versioning subsystem.
//!
//! - Structured logging (JSON, one line per event)
//! - Counter-only metrics
//! - Read-only: no side effects on the primitives being observed
//! - No async, no background threads

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
