//! Excluded (partition, version) pairs after partial recovery.
//!
//! When persistence recovery restores only part of a partition's
//! history, the recovery coordinator marks the affected
//! (partition, version) combinations so the rest of the engine stops
//! treating them as authoritative.
//!
//! Layout: one growable, shrinkable array of packed 64-bit keys
//! (partition in the high 32 bits, version in the low 32), totally
//! ordered by the packed key. Live entries sit right-aligned in the
//! tail of the array, sorted ascending; unused head slots stay
//! zero-filled. Inserting shifts the smaller prefix one slot left into
//! the free head space, so point lookups, range scans and inserts are
//! all a binary search plus a bounded shift.
//!
//! NOT thread-safe. The owning coordinator must serialize all access
//! on its own single-threaded event loop.

use std::fmt;
use std::sync::Arc;

use crate::observability::MetricsRegistry;

/// Default minimum capacity of the backing array.
const DEFAULT_MIN_CAPACITY: usize = 16;

/// Free capacity tolerated before a shrink is considered.
const SHRINK_SLACK: usize = 16;

fn pack(partition: u32, version: u32) -> u64 {
    (u64::from(partition) << 32) | u64::from(version)
}

fn unpack(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}

/// A compact sorted set of (partition, version) pairs excluded from
/// normal consideration.
pub struct PartitionVersionExclusions {
    /// Packed keys; live entries right-aligned, head zero-filled.
    keys: Vec<u64>,
    /// Number of live entries.
    size: usize,
    /// Capacity floor the array never shrinks below.
    min_capacity: usize,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PartitionVersionExclusions {
    /// Create an empty exclusion list with the default capacity floor.
    pub fn new() -> Self {
        Self::with_min_capacity(DEFAULT_MIN_CAPACITY)
    }

    /// Create an empty exclusion list with a custom capacity floor.
    pub fn with_min_capacity(min_capacity: usize) -> Self {
        let min_capacity = min_capacity.max(1);
        Self {
            keys: vec![0; min_capacity],
            size: 0,
            min_capacity,
            metrics: None,
        }
    }

    /// Report grow/shrink events to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mark a (partition, version) pair as excluded. No-op if the exact
    /// pair is already excluded.
    pub fn exclude(&mut self, partition: u32, version: u32) {
        let key = pack(partition, version);
        let pos = match self.live().binary_search(&key) {
            Ok(_) => return,
            Err(pos) => pos,
        };

        if self.size == self.keys.len() {
            self.grow();
        }

        let start = self.keys.len() - self.size;
        // Shift the prefix below the insertion point one slot left into
        // the free head space; start >= 1 after the grow check
        self.keys.copy_within(start..start + pos, start - 1);
        self.keys[start - 1 + pos] = key;
        self.size += 1;
    }

    /// Whether the exact (partition, version) pair is excluded.
    pub fn is_excluded(&self, partition: u32, version: u32) -> bool {
        self.live().binary_search(&pack(partition, version)).is_ok()
    }

    /// Whether the (partition, version) pair may be trusted, i.e. is
    /// not excluded.
    pub fn is_allowed(&self, partition: u32, version: u32) -> bool {
        !self.is_excluded(partition, version)
    }

    /// Remove every excluded version of the given partition.
    pub fn reset(&mut self, partition: u32) {
        while let Some(index) = self.find_any_for_partition(partition) {
            self.remove_at(index);
        }
    }

    /// Remove exactly one (partition, version) pair. Returns whether
    /// the pair was present.
    pub fn reset_version(&mut self, partition: u32, version: u32) -> bool {
        let key = pack(partition, version);
        match self.live().binary_search(&key) {
            Ok(pos) => {
                let start = self.keys.len() - self.size;
                self.remove_at(start + pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Number of excluded pairs.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no pairs are excluded.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current backing-array capacity (diagnostic).
    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Lazy traversal of all excluded pairs in ascending
    /// (partition, version) order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.live().iter().map(|&key| unpack(key))
    }

    /// Visit all excluded pairs in ascending order.
    pub fn for_each<F: FnMut(u32, u32)>(&self, mut visitor: F) {
        for (partition, version) in self.iter() {
            visitor(partition, version);
        }
    }

    /// The sorted live entries.
    fn live(&self) -> &[u64] {
        &self.keys[self.keys.len() - self.size..]
    }

    /// Absolute index of any live entry for `partition`, or None.
    fn find_any_for_partition(&self, partition: u32) -> Option<usize> {
        let start = self.keys.len() - self.size;
        self.live()
            .binary_search_by(|key| (key >> 32).cmp(&u64::from(partition)))
            .ok()
            .map(|pos| start + pos)
    }

    /// Remove the live entry at absolute `index`, shifting the prefix
    /// right so entries stay right-aligned, then consider shrinking.
    fn remove_at(&mut self, index: usize) {
        let start = self.keys.len() - self.size;
        debug_assert!(index >= start && index < self.keys.len());

        self.keys.copy_within(start..index, start + 1);
        self.keys[start] = 0;
        self.size -= 1;
        self.maybe_shrink();
    }

    /// Grow to `min(2 * size, size + 32)` entries, keeping live entries
    /// right-aligned.
    fn grow(&mut self) {
        let new_capacity = (2 * self.size)
            .min(self.size + 32)
            .max(self.min_capacity)
            .max(self.size + 1);
        self.reallocate(new_capacity);
        if let Some(metrics) = &self.metrics {
            metrics.increment_exclusion_grows();
        }
    }

    /// Shrink when free capacity exceeds `max(size / 4, 16)` and the
    /// array is above the floor: new capacity is the old one minus half
    /// the free space, never below the floor or the live count.
    fn maybe_shrink(&mut self) {
        let capacity = self.keys.len();
        let free = capacity - self.size;
        if free <= (self.size / 4).max(SHRINK_SLACK) || capacity <= self.min_capacity {
            return;
        }

        let new_capacity = (capacity - free / 2).max(self.min_capacity).max(self.size);
        if new_capacity < capacity {
            self.reallocate(new_capacity);
            if let Some(metrics) = &self.metrics {
                metrics.increment_exclusion_shrinks();
            }
        }
    }

    fn reallocate(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= self.size);
        let mut keys = vec![0u64; new_capacity];
        let start = new_capacity - self.size;
        let old_start = self.keys.len() - self.size;
        keys[start..].copy_from_slice(&self.keys[old_start..]);
        self.keys = keys;
    }
}

impl Default for PartitionVersionExclusions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PartitionVersionExclusions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionVersionExclusions")
            .field("size", &self.size)
            .field("capacity", &self.keys.len())
            .finish()
    }
}
