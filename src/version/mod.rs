//! Compact versioning - wire representations of monotonic counters.
//!
//! This module provides:
//! - `make_trint14` / `translate_trint14` - 13 value bits plus presence flag
//! - `make_trint24` / `translate_trint24` - 24 value bits, no absence encoding
//! - `TrintConfig` - diagnostic configuration for large-gap corrections
//!
//! Version and sequence counters only ever move forward, so the wire
//! can carry their low-order bits and the receiver can reconstruct the
//! full value from its own approximate copy of the counter.

mod trint;

pub use trint::{
    make_trint14, make_trint24, translate_trint14, translate_trint24, translate_trint24_with,
    TrintConfig, TrintError, TrintResult, TRINT14_MAX_VARIANCE, TRINT14_PRESENT,
    TRINT14_VALUE_MASK, TRINT24_DOMAIN_SPAN, TRINT24_MAX_VARIANCE, TRINT24_VALUE_MASK,
};
