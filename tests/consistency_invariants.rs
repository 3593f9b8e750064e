//! Consistency tracker liveness and staleness tests.
//!
//! Properties under test:
//! - A partition stays modified until its last outstanding submission
//!   commits
//! - `wait_for_partition_commit` returns only after the last commit and
//!   reports the latest global committed version
//! - The staleness query surface: submit -> modified, commit -> stable
//!   relative to the new committed version

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gridstore::consistency::{PartitionConsistencyTracker, TrackerConfig};
use gridstore::observability::MetricsRegistry;
use gridstore::partition::PartitionSet;

// =============================================================================
// Staleness accounting
// =============================================================================

/// Three submissions need three commits before the partition is stable.
#[test]
fn test_partition_stable_only_after_last_commit() {
    let tracker = PartitionConsistencyTracker::new(16);
    let before = tracker.global_committed();

    for _ in 0..3 {
        tracker.submit(7).unwrap();
    }

    tracker.commit(7).unwrap();
    assert!(tracker.is_partition_modified(before, 7).unwrap());
    tracker.commit(7).unwrap();
    assert!(tracker.is_partition_modified(before, 7).unwrap());
    tracker.commit(7).unwrap();

    // No pending submissions left; still modified relative to `before`
    // because commits happened since, but stable relative to now
    assert!(tracker.is_partition_modified(before, 7).unwrap());
    assert!(!tracker
        .is_partition_modified(tracker.global_committed(), 7)
        .unwrap());
    assert_eq!(tracker.wait_for_partition_commit(7).unwrap(), 3);
}

/// The query-coordinator flow: capture a committed point, mutate, ask
/// which partitions went stale.
#[test]
fn test_modified_partitions_end_to_end() {
    let tracker = PartitionConsistencyTracker::new(16);
    let mut candidates = PartitionSet::new(16);
    candidates.insert(3);

    tracker.submit(3).unwrap();
    let modified = tracker.modified_partitions(0, &candidates).unwrap();
    assert!(modified.contains(3));
    assert_eq!(modified.len(), 1);

    tracker.commit(3).unwrap();
    let point = tracker.global_committed();
    let modified = tracker.modified_partitions(point, &candidates).unwrap();
    assert!(modified.is_empty());
}

/// Global counters track totals across partitions.
#[test]
fn test_global_counters() {
    let tracker = PartitionConsistencyTracker::new(16);
    tracker.submit(1).unwrap();
    tracker.submit(2).unwrap();
    tracker.submit(2).unwrap();
    assert_eq!(tracker.global_submitted(), 3);
    assert_eq!(tracker.global_committed(), 0);

    tracker.commit(2).unwrap();
    tracker.commit(1).unwrap();
    tracker.commit(2).unwrap();
    assert_eq!(tracker.global_committed(), 3);
}

// =============================================================================
// Blocking liveness
// =============================================================================

/// A waiter on a pending partition blocks until the last commit, then
/// observes the latest committed version.
#[test]
fn test_waiter_blocks_until_last_commit() {
    let tracker = Arc::new(PartitionConsistencyTracker::new(16));
    for _ in 0..3 {
        tracker.submit(7).unwrap();
    }

    let released = Arc::new(AtomicBool::new(false));
    let waiter = {
        let tracker = Arc::clone(&tracker);
        let released = Arc::clone(&released);
        thread::spawn(move || {
            let committed = tracker.wait_for_partition_commit(7).unwrap();
            released.store(true, Ordering::SeqCst);
            committed
        })
    };

    // Two commits are not enough
    tracker.commit(7).unwrap();
    tracker.commit(7).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(!released.load(Ordering::SeqCst));

    tracker.commit(7).unwrap();
    let committed = waiter.join().unwrap();
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(committed, 3);
}

/// The global wait releases once every partition's submissions commit.
#[test]
fn test_global_wait_releases_on_stability() {
    let config = TrackerConfig {
        wait_poll_interval: Duration::from_millis(10),
    };
    let metrics = Arc::new(MetricsRegistry::new());
    let tracker = Arc::new(
        PartitionConsistencyTracker::with_config(16, config).with_metrics(Arc::clone(&metrics)),
    );

    tracker.submit(1).unwrap();
    tracker.submit(9).unwrap();

    let waiter = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || tracker.wait_for_pending_commit())
    };

    thread::sleep(Duration::from_millis(30));
    tracker.commit(1).unwrap();
    tracker.commit(9).unwrap();
    waiter.join().unwrap();

    assert_eq!(tracker.global_submitted(), tracker.global_committed());
    assert_eq!(metrics.snapshot().submits_recorded, 2);
    assert_eq!(metrics.snapshot().commits_recorded, 2);
}

/// A wakeup for one partition does not release a waiter on another
/// (shared condition: the waiter wakes, re-checks, sleeps again).
#[test]
fn test_waiter_survives_unrelated_wakeups() {
    let tracker = Arc::new(PartitionConsistencyTracker::new(16));
    tracker.submit(3).unwrap();
    tracker.submit(5).unwrap();

    let released = Arc::new(AtomicBool::new(false));
    let waiter = {
        let tracker = Arc::clone(&tracker);
        let released = Arc::clone(&released);
        thread::spawn(move || {
            let committed = tracker.wait_for_partition_commit(5).unwrap();
            released.store(true, Ordering::SeqCst);
            committed
        })
    };

    // Partition 3 going stable broadcasts, but 5 is still pending
    tracker.commit(3).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(!released.load(Ordering::SeqCst));

    tracker.commit(5).unwrap();
    let committed = waiter.join().unwrap();
    assert_eq!(committed, 2);
}

// =============================================================================
// Concurrent submit/commit pairs
// =============================================================================

/// Many threads running submit/commit pairs: global counters balance
/// and every partition ends stable.
#[test]
fn test_concurrent_submit_commit_balance() {
    let tracker = Arc::new(PartitionConsistencyTracker::new(32));
    let mut handles = Vec::new();

    for t in 0u32..8 {
        let tracker = Arc::clone(&tracker);
        handles.push(thread::spawn(move || {
            let partition = t % 4;
            for _ in 0..500 {
                tracker.submit(partition).unwrap();
                tracker.commit(partition).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracker.global_submitted(), 4000);
    assert_eq!(tracker.global_committed(), 4000);
    for partition in 0..4 {
        assert_eq!(
            tracker.wait_for_partition_commit(partition).unwrap(),
            tracker.committed_version(partition).unwrap()
        );
        assert!(!tracker
            .is_partition_modified(tracker.global_committed(), partition)
            .unwrap());
    }
    tracker.wait_for_pending_commit();
}
