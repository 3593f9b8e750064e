//! Partition mutation consistency.
//!
//! This module provides:
//! - `PartitionConsistencyTracker` - per-partition submitted/committed
//!   counters with a blocking stability protocol
//! - `TrackerConfig` - wait polling configuration
//!
//! Invariants:
//! - global committed never exceeds global submitted
//! - a partition is stable relative to an earlier committed version V
//!   iff it has no pending submission and its committed version
//!   exceeds V
//! - a pending count can never go negative; an underflow is a fatal
//!   protocol violation, not an error to recover from

mod slot;
mod tracker;

pub use tracker::{
    ConsistencyError, ConsistencyResult, PartitionConsistencyTracker, TrackerConfig,
};
