//! Lock-free membership tracking.
//!
//! This module provides:
//! - `ConcurrentOrderedLongSet` - copy-on-write sorted set of non-zero
//!   i64 values for many concurrent readers and occasional writers
//!
//! Used by the storage engine for small live sets it cannot afford to
//! lock around: member ids, deferred-request identifiers.

mod ordered_set;

pub use ordered_set::{ConcurrentOrderedLongSet, MembershipError};
