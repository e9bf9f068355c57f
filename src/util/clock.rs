//! Wall-clock helpers.
//!
//! The scheduling core never reads the clock itself: every time-dependent
//! operation takes `now_ms` from the caller. These helpers are for the
//! collaborators that feed it.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Nanoseconds since the Unix epoch truncated to 64 bits, for seeding.
pub fn now_nanos_u64() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Convert whole seconds to the millisecond timestamps used by the core.
pub const fn secs_to_ms(secs: u64) -> u128 {
    secs as u128 * 1000
}

/// Seconds elapsed between two millisecond timestamps, zero if `later < earlier`.
pub fn elapsed_secs(earlier_ms: u128, later_ms: u128) -> f64 {
    later_ms.saturating_sub(earlier_ms) as f64 / 1000.0
}
