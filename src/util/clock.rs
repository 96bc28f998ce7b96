//! Timestamp helpers.
//!
//! The engine uses two clocks for two different purposes: wall-clock milliseconds for
//! anything that gets serialized or compared across a process boundary (metrics history,
//! task creation time), and `Instant` for anything that only ever measures a duration
//! within this process (work-unit timing). Mixing them up would let a clock step corrupt
//! a duration, so the two are kept as distinct helper types.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
}

/// A monotonic instant, re-exported so callers don't need `std::time` directly.
#[must_use]
pub fn monotonic_now() -> Instant {
    Instant::now()
}
