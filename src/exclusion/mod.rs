//! Recovery-time partition version exclusions.
//!
//! This module provides:
//! - `PartitionVersionExclusions` - a compact sorted set of
//!   (partition, version) pairs that must not be treated as
//!   authoritative after a partial restore
//!
//! Single-writer by contract: the recovery coordinator serializes all
//! access on its own event loop; there is no internal synchronization.

mod list;

pub use list::PartitionVersionExclusions;
