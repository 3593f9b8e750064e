//! Partition consistency tracker.
//!
//! Resolves the race between "a mutation reached partition P's primary
//! data" and "P's dependent structures (indexes, continuous queries)
//! have processed that mutation" without a lock on the whole partition
//! map:
//!
//! - The engine calls `submit` before applying a mutation's index
//!   updates and `commit` once they are applied.
//! - A query coordinator captures `global_committed()` when it caches
//!   results, and later asks `modified_partitions` which cached entries
//!   went stale.
//! - A reader that must observe a fully caught-up partition blocks in
//!   `wait_for_partition_commit`.
//!
//! Wakeups use one shared condition for all partitions: commit
//! broadcasts, waiters re-check and go back to sleep if their partition
//! is still pending. The bounded wait timeout is a safety net against a
//! missed wakeup, not a correctness mechanism; waiters treat timeout
//! and wakeup identically.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

use crate::observability::{Logger, MetricsRegistry};
use crate::partition::PartitionSet;

use super::slot::PartitionSlot;

/// Result alias for tracker operations.
pub type ConsistencyResult<T> = Result<T, ConsistencyError>;

/// Errors from consistency tracker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// Partition id at or above the configured partition count.
    PartitionOutOfRange { partition: u32, partition_count: u32 },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyError::PartitionOutOfRange {
                partition,
                partition_count,
            } => {
                write!(
                    f,
                    "partition id {} out of range (partition count {})",
                    partition, partition_count
                )
            }
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Upper bound on a single blocked wait before the waiter re-checks
    /// state. Purely a missed-wakeup safety net.
    pub wait_poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            wait_poll_interval: Duration::from_millis(50),
        }
    }
}

/// Per-storage-unit tracker of partition submitted/committed versions.
///
/// One instance per storage unit, owned by the storage engine; nothing
/// here is process-global. Slots are created lazily on first submit and
/// dropped explicitly when the partition leaves this node.
pub struct PartitionConsistencyTracker {
    /// Mutations submitted across all partitions.
    global_submitted: AtomicU64,
    /// Commits recorded across all partitions.
    global_committed: AtomicU64,
    /// Sparse slot array indexed by partition id.
    slots: Box<[RwLock<Option<Arc<PartitionSlot>>>]>,
    /// Readers currently blocked in a wait call.
    waiting_readers: Mutex<u32>,
    /// Single shared wakeup condition for all partitions.
    stable: Condvar,
    config: TrackerConfig,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PartitionConsistencyTracker {
    /// Create a tracker for a storage unit with the given fixed
    /// partition count.
    pub fn new(partition_count: u32) -> Self {
        Self::with_config(partition_count, TrackerConfig::default())
    }

    /// Create a tracker with an explicit configuration.
    pub fn with_config(partition_count: u32, config: TrackerConfig) -> Self {
        let slots: Vec<_> = (0..partition_count).map(|_| RwLock::new(None)).collect();
        Self {
            global_submitted: AtomicU64::new(0),
            global_committed: AtomicU64::new(0),
            slots: slots.into_boxed_slice(),
            waiting_readers: Mutex::new(0),
            stable: Condvar::new(),
            config,
            metrics: None,
        }
    }

    /// Report submits, commits, wakeups and wait timeouts to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The partition count this tracker was sized for.
    pub fn partition_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Record one mutation submitted against a partition.
    ///
    /// Returns the partition's new submitted count. The caller must
    /// already hold whatever external synchronization guards the
    /// partition's primary mutation: this call only records that one
    /// occurred, it does not serialize submissions.
    pub fn submit(&self, partition: u32) -> ConsistencyResult<u64> {
        let slot = self.ensure_slot(partition)?;
        let submitted = slot.begin_submit();
        self.global_submitted.fetch_add(1, Ordering::SeqCst);
        if let Some(metrics) = &self.metrics {
            metrics.increment_submits();
        }
        Ok(submitted)
    }

    /// Record that a prior submission's dependent structures are caught
    /// up.
    ///
    /// Panics if the partition has no matching submission outstanding:
    /// that is a lost or duplicated submit/commit pairing, and
    /// continuing would silently corrupt the staleness test everything
    /// downstream relies on.
    pub fn commit(&self, partition: u32) -> ConsistencyResult<()> {
        let slot = self
            .existing_slot(partition)?
            .unwrap_or_else(|| panic!("commit for partition {} without a submit", partition));

        {
            let _commit_guard = slot.lock_commit();
            let committed = self.global_committed.fetch_add(1, Ordering::SeqCst) + 1;
            let remaining = slot.finish_commit(committed);
            if let Some(metrics) = &self.metrics {
                metrics.increment_commits();
            }
            if remaining > 0 {
                return Ok(());
            }
        }

        // Partition went stable: wake waiters if any are parked. One
        // shared condition for all partitions, so this is a broadcast
        // and waiters re-check their own state.
        let waiting = self.waiting_readers.lock().unwrap();
        if *waiting > 0 {
            self.stable.notify_all();
            if let Some(metrics) = &self.metrics {
                metrics.increment_wakeups();
            }
        }
        Ok(())
    }

    /// Whether the partition has a pending submission, or a committed
    /// version newer than `since_committed`. A partition with no slot
    /// was never submitted to (or was dropped) and is unmodified.
    pub fn is_partition_modified(
        &self,
        since_committed: u64,
        partition: u32,
    ) -> ConsistencyResult<bool> {
        Ok(match self.existing_slot(partition)? {
            Some(slot) => slot.pending() > 0 || slot.committed() > since_committed,
            None => false,
        })
    }

    /// The subset of `candidates` modified relative to
    /// `since_committed`. The primary staleness query for cached
    /// per-partition results.
    pub fn modified_partitions(
        &self,
        since_committed: u64,
        candidates: &PartitionSet,
    ) -> ConsistencyResult<PartitionSet> {
        let mut modified = PartitionSet::new(candidates.partition_count());
        for partition in candidates.iter() {
            if self.is_partition_modified(since_committed, partition)? {
                modified.insert(partition);
            }
        }
        Ok(modified)
    }

    /// Block until every submitted mutation across all partitions has
    /// committed. Point-in-time only: new submissions can race in the
    /// moment this returns.
    pub fn wait_for_pending_commit(&self) {
        loop {
            if self.is_globally_stable() {
                return;
            }
            if !self.park_and_recheck(|| self.is_globally_stable()) {
                continue;
            }
            return;
        }
    }

    /// Block until the named partition has no pending submission, then
    /// return its committed version. A partition with no slot is
    /// already stable and returns 0.
    pub fn wait_for_partition_commit(&self, partition: u32) -> ConsistencyResult<u64> {
        loop {
            let slot = match self.existing_slot(partition)? {
                Some(slot) => slot,
                None => return Ok(0),
            };
            if slot.pending() == 0 {
                return Ok(slot.committed());
            }
            self.park_and_recheck(|| slot.pending() == 0);
        }
    }

    /// Remove the partition's slot. Called when the partition is no
    /// longer owned by this storage node; the caller guarantees no
    /// submission is in flight.
    pub fn drop_committed_version(&self, partition: u32) -> ConsistencyResult<()> {
        let index = self.check_range(partition)?;
        let dropped = self.slots[index].write().unwrap().take();
        if dropped.is_some() {
            Logger::debug("SLOT_DROPPED", &[("partition", &partition.to_string())]);
        }
        Ok(())
    }

    /// Raise the partition's submitted counter to `new_version` if that
    /// is greater than its current value (e.g. when adopting a version
    /// from a previous owner). Never decreases.
    pub fn reset_submitted(&self, partition: u32, new_version: u64) -> ConsistencyResult<()> {
        let slot = self.ensure_slot(partition)?;
        slot.raise_submitted(new_version);
        Ok(())
    }

    /// Global committed counter; capture this as the consistency point
    /// for later `is_partition_modified` queries.
    pub fn global_committed(&self) -> u64 {
        self.global_committed.load(Ordering::SeqCst)
    }

    /// Global submitted counter.
    pub fn global_submitted(&self) -> u64 {
        self.global_submitted.load(Ordering::SeqCst)
    }

    /// The partition's committed version (0 if it has no slot).
    pub fn committed_version(&self, partition: u32) -> ConsistencyResult<u64> {
        Ok(self
            .existing_slot(partition)?
            .map(|slot| slot.committed())
            .unwrap_or(0))
    }

    /// The partition's submitted count (0 if it has no slot).
    pub fn submitted_version(&self, partition: u32) -> ConsistencyResult<u64> {
        Ok(self
            .existing_slot(partition)?
            .map(|slot| slot.submitted())
            .unwrap_or(0))
    }

    fn is_globally_stable(&self) -> bool {
        self.global_submitted.load(Ordering::SeqCst) == self.global_committed.load(Ordering::SeqCst)
    }

    /// Register as a waiting reader and block for at most one poll
    /// interval. Returns the result of `condition` after waking.
    ///
    /// The stability re-check under the waiter lock closes the race
    /// with `commit`: a committer must take the same lock to decide
    /// whether to broadcast, so it cannot slip between our check and
    /// the wait.
    fn park_and_recheck<F: Fn() -> bool>(&self, condition: F) -> bool {
        let mut waiting = self.waiting_readers.lock().unwrap();
        if condition() {
            return true;
        }
        *waiting += 1;
        let (mut waiting, timeout) = self
            .stable
            .wait_timeout(waiting, self.config.wait_poll_interval)
            .unwrap();
        *waiting -= 1;
        drop(waiting);

        if timeout.timed_out() {
            if let Some(metrics) = &self.metrics {
                metrics.increment_wait_timeouts();
            }
        }
        condition()
    }

    fn check_range(&self, partition: u32) -> ConsistencyResult<usize> {
        if (partition as usize) < self.slots.len() {
            Ok(partition as usize)
        } else {
            Err(ConsistencyError::PartitionOutOfRange {
                partition,
                partition_count: self.partition_count(),
            })
        }
    }

    fn existing_slot(&self, partition: u32) -> ConsistencyResult<Option<Arc<PartitionSlot>>> {
        let index = self.check_range(partition)?;
        Ok(self.slots[index].read().unwrap().clone())
    }

    fn ensure_slot(&self, partition: u32) -> ConsistencyResult<Arc<PartitionSlot>> {
        let index = self.check_range(partition)?;
        if let Some(slot) = self.slots[index].read().unwrap().as_ref() {
            return Ok(Arc::clone(slot));
        }
        let mut guard = self.slots[index].write().unwrap();
        Ok(Arc::clone(
            guard.get_or_insert_with(|| Arc::new(PartitionSlot::new())),
        ))
    }
}

impl fmt::Debug for PartitionConsistencyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionConsistencyTracker")
            .field("partition_count", &self.partition_count())
            .field("global_submitted", &self.global_submitted())
            .field("global_committed", &self.global_committed())
            .finish()
    }
}
