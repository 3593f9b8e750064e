//! Exclusion list invariant tests.
//!
//! Properties under test:
//! - `is_excluded` exactly reflects the net effect of any
//!   exclude/reset sequence, including across grow and shrink
//!   boundaries (forced with well over 100 entries)
//! - Recovery scenario: exclude, query, reset, query again

use std::collections::BTreeSet;

use gridstore::exclusion::PartitionVersionExclusions;
use gridstore::observability::MetricsRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

// =============================================================================
// Recovery scenarios
// =============================================================================

/// The partial-restore flow: mark, verify, clear.
#[test]
fn test_recovery_exclude_then_reset() {
    let mut list = PartitionVersionExclusions::new();

    list.exclude(5, 10);
    assert!(!list.is_allowed(5, 10));
    assert!(list.is_allowed(5, 11));

    list.reset(5);
    assert!(list.is_allowed(5, 10));
    assert!(list.is_empty());
}

/// Reset of one partition leaves neighboring partitions excluded.
#[test]
fn test_reset_is_partition_scoped() {
    let mut list = PartitionVersionExclusions::new();
    for partition in [4, 5, 6] {
        for version in 0..5 {
            list.exclude(partition, version);
        }
    }

    list.reset(5);

    for version in 0..5 {
        assert!(list.is_allowed(5, version));
        assert!(list.is_excluded(4, version));
        assert!(list.is_excluded(6, version));
    }
    assert_eq!(list.len(), 10);
}

// =============================================================================
// Grow/shrink boundary crossings
// =============================================================================

/// More than 100 entries force at least one grow; removing them forces
/// at least one shrink; lookups stay exact throughout.
#[test]
fn test_grow_and_shrink_preserve_contents() {
    let metrics = Arc::new(MetricsRegistry::new());
    let mut list = PartitionVersionExclusions::new().with_metrics(Arc::clone(&metrics));

    for partition in 0..8 {
        for version in 0..20 {
            list.exclude(partition, version);
        }
    }
    assert_eq!(list.len(), 160);
    assert!(metrics.snapshot().exclusion_grows >= 1);

    for partition in 0..8 {
        for version in 0..20 {
            assert!(list.is_excluded(partition, version));
        }
        assert!(list.is_allowed(partition, 20));
    }

    for partition in 0..7 {
        list.reset(partition);
    }
    assert_eq!(list.len(), 20);
    assert!(metrics.snapshot().exclusion_shrinks >= 1);

    for version in 0..20 {
        assert!(list.is_excluded(7, version));
        assert!(list.is_allowed(3, version));
    }
}

/// Ascending iteration stays correct across a grow boundary.
#[test]
fn test_iteration_order_after_growth() {
    let mut list = PartitionVersionExclusions::with_min_capacity(2);
    // Insert in a scrambled order
    for version in (0..60).rev() {
        list.exclude(2, version);
    }
    for version in 0..60 {
        list.exclude(1, version);
    }

    let pairs: Vec<_> = list.iter().collect();
    assert_eq!(pairs.len(), 120);
    assert!(pairs.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(pairs[0], (1, 0));
    assert_eq!(pairs[119], (2, 59));
}

// =============================================================================
// Randomized model checking
// =============================================================================

/// Random exclude / reset_version / reset sequence against a BTreeSet
/// model; sizes swing far enough to cross grow and shrink boundaries
/// repeatedly.
#[test]
fn test_random_sequence_matches_model() {
    let mut rng = StdRng::seed_from_u64(0xE5C1_5EED);
    let mut list = PartitionVersionExclusions::with_min_capacity(4);
    let mut model: BTreeSet<(u32, u32)> = BTreeSet::new();

    for round in 0..4000 {
        let partition = rng.gen_range(0u32..6);
        let version = rng.gen_range(0u32..40);

        match rng.gen_range(0u8..10) {
            0..=5 => {
                list.exclude(partition, version);
                model.insert((partition, version));
            }
            6..=7 => {
                let removed = list.reset_version(partition, version);
                assert_eq!(removed, model.remove(&(partition, version)));
            }
            _ => {
                list.reset(partition);
                model.retain(|&(p, _)| p != partition);
            }
        }

        assert_eq!(list.len(), model.len(), "round {}", round);
        assert_eq!(
            list.iter().collect::<Vec<_>>(),
            model.iter().copied().collect::<Vec<_>>(),
            "round {}",
            round
        );
    }

    // Every point query agrees with the model at the end
    for partition in 0..6 {
        for version in 0..40 {
            assert_eq!(
                list.is_excluded(partition, version),
                model.contains(&(partition, version))
            );
        }
    }
}
