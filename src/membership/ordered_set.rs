//! Lock-free sorted set of non-zero 64-bit values.
//!
//! Copy-on-write over an atomically swapped immutable snapshot:
//! - Readers acquire one snapshot and binary search it; they never
//!   block and never allocate.
//! - Writers build a replacement snapshot and publish it with a
//!   compare-and-swap, retrying from the top on contention.
//!
//! Intended for small sets with infrequent writes (live member ids,
//! deferred-request identifiers), where unbounded optimistic retries
//! under contention are acceptable.
//!
//! The value `0` is reserved as the empty-slot sentinel inside the
//! snapshot and can never be a member; `add(0)` and `remove(0)` are
//! rejected.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

use crate::observability::MetricsRegistry;

/// Fixed growth increment for the backing array: bounds the copy cost
/// of a single insert instead of doubling.
const GROWTH_INCREMENT: usize = 8;

/// Errors from ordered set mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipError {
    /// Zero is the reserved empty-slot sentinel and cannot be a member.
    ZeroValue,
}

impl fmt::Display for MembershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipError::ZeroValue => {
                write!(f, "zero is reserved and cannot be stored in the ordered set")
            }
        }
    }
}

impl std::error::Error for MembershipError {}

/// Immutable snapshot: live values sorted ascending in the tail of the
/// array, unused head slots zero-filled.
#[derive(Debug)]
struct Holder {
    values: Box<[i64]>,
    live: usize,
}

impl Holder {
    fn empty() -> Self {
        Self {
            values: Vec::new().into_boxed_slice(),
            live: 0,
        }
    }

    /// The strictly increasing suffix of live values.
    fn live_slice(&self) -> &[i64] {
        &self.values[self.values.len() - self.live..]
    }

    /// A new snapshot with `value` inserted in sorted position, growing
    /// the backing array by a fixed increment when full.
    fn with_added(&self, value: i64) -> Self {
        let capacity = if self.live == self.values.len() {
            self.values.len() + GROWTH_INCREMENT
        } else {
            self.values.len()
        };

        let live = self.live_slice();
        let pos = match live.binary_search(&value) {
            // Caller checked for presence already; a concurrent snapshot
            // cannot appear mid-copy because snapshots are immutable
            Ok(_) => return self.clone_holder(),
            Err(pos) => pos,
        };

        let mut values = vec![0i64; capacity];
        let start = capacity - (self.live + 1);
        values[start..start + pos].copy_from_slice(&live[..pos]);
        values[start + pos] = value;
        values[start + pos + 1..].copy_from_slice(&live[pos..]);

        Self {
            values: values.into_boxed_slice(),
            live: self.live + 1,
        }
    }

    /// A new snapshot without the live value at `pos`; capacity is kept
    /// (shrinking happens only on empty, via the shared empty holder).
    fn with_removed(&self, pos: usize) -> Self {
        let capacity = self.values.len();
        let live = self.live_slice();

        let mut values = vec![0i64; capacity];
        let start = capacity - (self.live - 1);
        values[start..start + pos].copy_from_slice(&live[..pos]);
        values[start + pos..].copy_from_slice(&live[pos + 1..]);

        Self {
            values: values.into_boxed_slice(),
            live: self.live - 1,
        }
    }

    fn clone_holder(&self) -> Self {
        Self {
            values: self.values.clone(),
            live: self.live,
        }
    }
}

/// A lock-free, copy-on-write, sorted set of non-zero i64 values.
pub struct ConcurrentOrderedLongSet {
    holder: ArcSwap<Holder>,
    /// Shared empty snapshot, swapped back in when the set drains so a
    /// transient membership burst does not retain its peak capacity.
    empty: Arc<Holder>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ConcurrentOrderedLongSet {
    /// Create an empty set.
    pub fn new() -> Self {
        let empty = Arc::new(Holder::empty());
        Self {
            holder: ArcSwap::from(Arc::clone(&empty)),
            empty,
            metrics: None,
        }
    }

    /// Create an empty set that reports CAS contention to `metrics`.
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        let mut set = Self::new();
        set.metrics = Some(metrics);
        set
    }

    /// Add a value to the set.
    ///
    /// Returns `Ok(false)` if the value was already present. Zero is
    /// rejected: it is the reserved empty-slot sentinel.
    pub fn add(&self, value: i64) -> Result<bool, MembershipError> {
        if value == 0 {
            return Err(MembershipError::ZeroValue);
        }

        loop {
            let current = self.holder.load();
            if current.live_slice().binary_search(&value).is_ok() {
                return Ok(false);
            }

            let next = Arc::new(current.with_added(value));
            let previous = self.holder.compare_and_swap(&*current, next);
            if Arc::ptr_eq(&*previous, &*current) {
                return Ok(true);
            }
            self.note_contention();
        }
    }

    /// Remove a value from the set.
    ///
    /// Returns `Ok(false)` if the value was not present. Removing the
    /// last value swaps the shared empty snapshot back in.
    pub fn remove(&self, value: i64) -> Result<bool, MembershipError> {
        if value == 0 {
            return Err(MembershipError::ZeroValue);
        }

        loop {
            let current = self.holder.load();
            let pos = match current.live_slice().binary_search(&value) {
                Ok(pos) => pos,
                Err(_) => return Ok(false),
            };

            let next = if current.live == 1 {
                Arc::clone(&self.empty)
            } else {
                Arc::new(current.with_removed(pos))
            };

            let previous = self.holder.compare_and_swap(&*current, next);
            if Arc::ptr_eq(&*previous, &*current) {
                return Ok(true);
            }
            self.note_contention();
        }
    }

    /// Whether the set contains `value`. Wait-free: one snapshot
    /// acquisition and a binary search, no allocation.
    pub fn contains(&self, value: i64) -> bool {
        self.holder.load().live_slice().binary_search(&value).is_ok()
    }

    /// Number of values in the set. Wait-free.
    pub fn len(&self) -> usize {
        self.holder.load().live
    }

    /// Whether the set is empty. Wait-free.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the live values in ascending order.
    pub fn snapshot(&self) -> Vec<i64> {
        self.holder.load().live_slice().to_vec()
    }

    /// Backing capacity of the current snapshot (diagnostic).
    pub fn capacity(&self) -> usize {
        self.holder.load().values.len()
    }

    fn note_contention(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.increment_cas_retries();
        }
    }
}

impl Default for ConcurrentOrderedLongSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConcurrentOrderedLongSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentOrderedLongSet")
            .field("values", &self.snapshot())
            .finish()
    }
}
