//! Partition identity types.
//!
//! A partition is one of a fixed number of shards the keyspace is
//! divided into; the shard count is fixed when the storage unit is
//! configured. `PartitionSet` is the bitset the engine passes around
//! when it needs to name a group of partitions (ownership transfers,
//! staleness queries).

use std::fmt;

/// A fixed-capacity set of partition ids, stored as a bit per
/// partition.
///
/// Ids are dense small integers, so membership, insertion and removal
/// are single word operations. Out-of-range ids panic, like indexing
/// out of bounds.
#[derive(Clone, PartialEq, Eq)]
pub struct PartitionSet {
    words: Box<[u64]>,
    partition_count: u32,
    len: usize,
}

impl PartitionSet {
    /// Create an empty set over `partition_count` partitions.
    pub fn new(partition_count: u32) -> Self {
        let words = vec![0u64; (partition_count as usize + 63) / 64];
        Self {
            words: words.into_boxed_slice(),
            partition_count,
            len: 0,
        }
    }

    /// Create a set containing every partition id below
    /// `partition_count`.
    pub fn full(partition_count: u32) -> Self {
        let mut set = Self::new(partition_count);
        for partition in 0..partition_count {
            set.insert(partition);
        }
        set
    }

    /// The number of partitions this set ranges over.
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Add a partition id. Returns whether it was newly added.
    pub fn insert(&mut self, partition: u32) -> bool {
        let (word, bit) = self.locate(partition);
        let mask = 1u64 << bit;
        if self.words[word] & mask != 0 {
            return false;
        }
        self.words[word] |= mask;
        self.len += 1;
        true
    }

    /// Remove a partition id. Returns whether it was present.
    pub fn remove(&mut self, partition: u32) -> bool {
        let (word, bit) = self.locate(partition);
        let mask = 1u64 << bit;
        if self.words[word] & mask == 0 {
            return false;
        }
        self.words[word] &= !mask;
        self.len -= 1;
        true
    }

    /// Whether the set contains the partition id.
    pub fn contains(&self, partition: u32) -> bool {
        let (word, bit) = self.locate(partition);
        self.words[word] & (1u64 << bit) != 0
    }

    /// Number of partition ids in the set.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate the contained partition ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.partition_count).filter(move |&p| self.contains(p))
    }

    fn locate(&self, partition: u32) -> (usize, u32) {
        assert!(
            partition < self.partition_count,
            "partition id {} out of range (partition count {})",
            partition,
            self.partition_count
        );
        ((partition / 64) as usize, partition % 64)
    }
}

impl fmt::Debug for PartitionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // List member ids, not raw words
        f.debug_set().entries(self.iter()).finish()
    }
}
