//! Per-partition version slot.
//!
//! One slot per partition id, created on the first submission against
//! that partition and dropped when the partition leaves this storage
//! node. The slot carries the three counters the tracker's staleness
//! test reads: how many mutations were ever submitted, which global
//! commit the dependent structures last caught up to, and how many
//! submissions are still pending.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Counters for a single partition.
///
/// `pending > 0` means at least one mutation was submitted but not yet
/// committed; the partition is unconditionally treated as modified
/// while in that state.
#[derive(Debug, Default)]
pub(crate) struct PartitionSlot {
    /// Mutations ever submitted against this partition.
    submitted: AtomicU64,
    /// Global committed version stored by this partition's last commit.
    committed: AtomicU64,
    /// Submissions not yet committed.
    pending: AtomicU64,
    /// Serializes committers on this slot so the committed-version
    /// store and the pending decrement cannot interleave.
    commit_lock: Mutex<()>,
}

impl PartitionSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one submission: the partition enters (or stays in) the
    /// pending state. Returns the new per-partition submitted count.
    pub(crate) fn begin_submit(&self) -> u64 {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.submitted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record one commit under the commit lock: store the global
    /// committed version and release one pending submission. Returns
    /// the number of submissions still pending.
    ///
    /// Panics on pending underflow: a lost or duplicated submit/commit
    /// call has already corrupted the consistency protocol and must not
    /// be tolerated.
    pub(crate) fn finish_commit(&self, global_committed: u64) -> u64 {
        self.committed.store(global_committed, Ordering::SeqCst);
        let prior = self.pending.fetch_sub(1, Ordering::SeqCst);
        assert!(
            prior != 0,
            "pending commit count underflow: commit without a matching submit"
        );
        prior - 1
    }

    /// Raise the submitted counter to `new_version` if it is greater
    /// than the current value. Monotonic ratchet: never decreases.
    pub(crate) fn raise_submitted(&self, new_version: u64) -> bool {
        let mut current = self.submitted.load(Ordering::SeqCst);
        while new_version > current {
            match self.submitted.compare_exchange(
                current,
                new_version,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    pub(crate) fn lock_commit(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock().unwrap()
    }

    pub(crate) fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    pub(crate) fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    pub(crate) fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_slot_is_stable() {
        let slot = PartitionSlot::new();
        assert_eq!(slot.submitted(), 0);
        assert_eq!(slot.committed(), 0);
        assert_eq!(slot.pending(), 0);
    }

    #[test]
    fn test_submit_then_commit_round_trip() {
        let slot = PartitionSlot::new();
        assert_eq!(slot.begin_submit(), 1);
        assert_eq!(slot.begin_submit(), 2);
        assert_eq!(slot.pending(), 2);

        assert_eq!(slot.finish_commit(10), 1);
        assert_eq!(slot.finish_commit(11), 0);
        assert_eq!(slot.committed(), 11);
        assert_eq!(slot.submitted(), 2);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_commit_without_submit_panics() {
        let slot = PartitionSlot::new();
        slot.finish_commit(1);
    }

    #[test]
    fn test_raise_submitted_is_a_ratchet() {
        let slot = PartitionSlot::new();
        assert!(slot.raise_submitted(5));
        assert_eq!(slot.submitted(), 5);

        // Lower or equal values never take effect
        assert!(!slot.raise_submitted(3));
        assert!(!slot.raise_submitted(5));
        assert_eq!(slot.submitted(), 5);

        assert!(slot.raise_submitted(9));
        assert_eq!(slot.submitted(), 9);
    }
}
