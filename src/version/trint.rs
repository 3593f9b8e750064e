//! Trint codec - truncated wire integers for monotonic counters.
//!
//! A "trint" is the low-order slice of a monotonically non-decreasing
//! 64-bit counter (partition ownership version, packet sequence number).
//! The sender truncates; the receiver reconstructs the full value by
//! picking the candidate closest to an approximate "current" value it
//! already knows. Two widths exist:
//!
//! - 14-bit: 13 value bits plus a presence flag (`0x2000`). A wire zero
//!   means "no trint"; the flag guarantees a real value never encodes
//!   to zero.
//! - 24-bit: all bits are value bits; no absence encoding at this layer.
//!
//! The codec is stateless and pure. Callers must not pass a decreasing
//! `current` across calls for the same logical stream; the codec cannot
//! detect that.

use thiserror::Error;

use crate::observability::Logger;

/// Presence flag for 14-bit trints.
pub const TRINT14_PRESENT: u16 = 0x2000;
/// Value mask for 14-bit trints (13 value bits).
pub const TRINT14_VALUE_MASK: u16 = 0x1FFF;
/// Maximum distance between a 14-bit trint's value and `current`.
pub const TRINT14_MAX_VARIANCE: i64 = 8191;

/// Value mask for 24-bit trints.
pub const TRINT24_VALUE_MASK: u32 = 0xFF_FFFF;
/// Half the 24-bit domain: maximum reconstruction distance from `current`.
pub const TRINT24_MAX_VARIANCE: i64 = 8_388_608;
/// Full 24-bit domain span.
pub const TRINT24_DOMAIN_SPAN: i64 = 16_777_216;

/// Result alias for trint translation.
pub type TrintResult = Result<i64, TrintError>;

/// Errors from trint translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrintError {
    /// `current` must be non-negative for 14-bit translation.
    #[error("negative current value {0} passed to trint translation")]
    NegativeCurrent(i64),

    /// No reconstruction window contained a candidate: the sender and
    /// receiver drifted by more than half the domain span and the
    /// protocol cannot disambiguate. Indicates protocol-level data loss.
    #[error("trint translation failed: trint={trint}, current={current}")]
    Disambiguation { trint: u32, current: i64 },
}

/// Configuration for 24-bit translation diagnostics.
///
/// The large-gap threshold controls when a below-window reconstruction
/// is logged before being advanced by a full domain span. It is a
/// diagnostic knob, not a correctness boundary.
#[derive(Debug, Clone)]
pub struct TrintConfig {
    /// `current` values above this log a TRINT_LARGE_GAP event when the
    /// naive reconstruction falls below 1.
    pub large_gap_log_threshold: i64,
}

impl Default for TrintConfig {
    fn default() -> Self {
        Self {
            large_gap_log_threshold: 0x800,
        }
    }
}

/// Truncate a counter to a 14-bit trint.
///
/// The presence flag is always set, so the result is non-zero for any
/// input; a full-width zero on the wire is reserved for "no trint".
pub fn make_trint14(value: i64) -> u16 {
    TRINT14_PRESENT | (value as u16 & TRINT14_VALUE_MASK)
}

/// Reconstruct the counter a 14-bit trint was truncated from.
///
/// `current` is the receiver's latest known value for the stream and
/// must be non-negative. Returns `-1` when the presence flag is unset
/// ("no trint") or when no candidate lands in
/// `[max(0, current - 8191), current]`. The reconstruction never
/// exceeds `current`: this direction of the protocol only looks
/// backward.
pub fn translate_trint14(trint: u16, current: i64) -> TrintResult {
    if current < 0 {
        return Err(TrintError::NegativeCurrent(current));
    }
    if trint & TRINT14_PRESENT == 0 {
        return Ok(-1);
    }

    let low = i64::from(trint & TRINT14_VALUE_MASK);
    let floor = (current - TRINT14_MAX_VARIANCE).max(0);
    let base = current >> 13;

    for i in [-1i64, 0] {
        let guess = ((base + i) << 13) | low;
        if guess >= floor && guess <= current {
            return Ok(guess);
        }
    }

    Ok(-1)
}

/// Truncate a counter to a 24-bit trint.
pub fn make_trint24(value: i64) -> u32 {
    (value as u32) & TRINT24_VALUE_MASK
}

/// Reconstruct the counter a 24-bit trint was truncated from, using the
/// default diagnostic configuration.
pub fn translate_trint24(trint: u32, current: i64) -> TrintResult {
    translate_trint24_with(trint, current, &TrintConfig::default())
}

/// Reconstruct the counter a 24-bit trint was truncated from.
///
/// Searches the windows around `current >> 24` for the unique candidate
/// within half a domain span of `current` in either direction. Values
/// are used as indexes downstream, so the result must be `>= 1`: a
/// below-window match is advanced by one full domain span, which can
/// only happen when `current` is a stale estimate. That case is logged
/// when `current` exceeds the configured threshold; the corrected value
/// is still unique from the receiver's perspective, which is all the
/// protocol requires.
pub fn translate_trint24_with(trint: u32, current: i64, config: &TrintConfig) -> TrintResult {
    // Mask defensively: bullet-proofs against a double translation and
    // against senders that bit-or the domain span into the trint to
    // force it non-zero on wrap-around.
    let low = i64::from(trint & TRINT24_VALUE_MASK);

    let floor = current - TRINT24_MAX_VARIANCE;
    let ceiling = current + TRINT24_MAX_VARIANCE;
    let base = ((current as u64) >> 24) as i64;

    for i in [-1i64, 0, 1] {
        let guess = ((base + i) << 24) | low;
        if guess >= floor && guess <= ceiling {
            if guess < 1 {
                if current > config.large_gap_log_threshold {
                    Logger::debug(
                        "TRINT_LARGE_GAP",
                        &[
                            ("current", &current.to_string()),
                            ("trint", &low.to_string()),
                            ("value", &guess.to_string()),
                        ],
                    );
                }
                let corrected = guess + TRINT24_DOMAIN_SPAN;
                if corrected < 1 {
                    // Even a full-span correction could not bring the
                    // value back into index range
                    return Err(TrintError::Disambiguation {
                        trint: trint & TRINT24_VALUE_MASK,
                        current,
                    });
                }
                return Ok(corrected);
            }
            return Ok(guess);
        }
    }

    Err(TrintError::Disambiguation {
        trint: trint & TRINT24_VALUE_MASK,
        current,
    })
}
