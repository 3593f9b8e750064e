//! gridstore - partition consistency and compact versioning primitives
//! for a replicated in-memory data grid's storage engine.
//!
//! Four sibling components, consumed by the storage engine:
//! - `consistency` - knows, without a global lock, whether a
//!   partition's secondary structures have caught up with its latest
//!   mutation
//! - `exclusion` - marks specific (partition, version) combinations as
//!   untrustworthy after a partial restore
//! - `membership` - lock-free sorted set of small non-zero integers
//!   under heavy concurrent read
//! - `version` - compresses monotonic 64-bit counters into 14/24-bit
//!   wire integers and reconstructs them by closest guess
//!
//! None of the four call into each other.

pub mod consistency;
pub mod exclusion;
pub mod membership;
pub mod observability;
pub mod partition;
pub mod version;
