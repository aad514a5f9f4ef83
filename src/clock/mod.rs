// src/clock/mod.rs

use std::fmt::Debug;
use std::time::Instant;

pub mod mock;

/// Abstract monotonic clock used for progress timestamps.
///
/// Production code uses [`SystemClock`]; tests drive time by hand with
/// [`mock::ManualClock`].
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// Implementation backed by `std::time::Instant::now`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
