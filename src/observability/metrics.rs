//! Metrics registry for the versioning subsystem.
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase, reset only on process start
//! - Thread-safe, lock-free increments
//!
//! The registry is owned by the storage engine alongside the tracker
//! and exclusion list; components take a reference when the engine
//! wants them instrumented.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for the consistency/versioning primitives.
///
/// All counters use `Ordering::Relaxed`: metrics are allowed to be
/// momentarily stale, never wrong over time.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Mutations submitted through the consistency tracker
    submits_recorded: AtomicU64,
    /// Commits recorded through the consistency tracker
    commits_recorded: AtomicU64,
    /// Broadcast wakeups issued to waiting readers
    wakeups_broadcast: AtomicU64,
    /// Bounded-timeout waits that re-polled without a wakeup
    wait_timeouts: AtomicU64,
    /// CAS retries in the ordered set's copy-on-write loop
    cas_retries: AtomicU64,
    /// Exclusion list backing-array growths
    exclusion_grows: AtomicU64,
    /// Exclusion list backing-array shrinks
    exclusion_shrinks: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted mutation
    pub fn increment_submits(&self) {
        self.submits_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a commit
    pub fn increment_commits(&self) {
        self.commits_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broadcast wakeup of waiting readers
    pub fn increment_wakeups(&self) {
        self.wakeups_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a wait that timed out and re-polled
    pub fn increment_wait_timeouts(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a CAS retry under write contention
    pub fn increment_cas_retries(&self) {
        self.cas_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an exclusion list growth
    pub fn increment_exclusion_grows(&self) {
        self.exclusion_grows.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an exclusion list shrink
    pub fn increment_exclusion_shrinks(&self) {
        self.exclusion_shrinks.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submits_recorded: self.submits_recorded.load(Ordering::Relaxed),
            commits_recorded: self.commits_recorded.load(Ordering::Relaxed),
            wakeups_broadcast: self.wakeups_broadcast.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
            exclusion_grows: self.exclusion_grows.load(Ordering::Relaxed),
            exclusion_shrinks: self.exclusion_shrinks.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of the registry, serializable for scrape endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submits_recorded: u64,
    pub commits_recorded: u64,
    pub wakeups_broadcast: u64,
    pub wait_timeouts: u64,
    pub cas_retries: u64,
    pub exclusion_grows: u64,
    pub exclusion_shrinks: u64,
}
