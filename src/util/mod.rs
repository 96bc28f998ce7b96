//! Shared utilities.

pub mod clock;

pub use clock::{monotonic_now, now_ms};
