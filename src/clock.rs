//! Wall-clock access for build bookkeeping.
//!
//! All timestamps in the build cache are `u64` milliseconds since the Unix
//! epoch. File modification times and "built at" stamps share the unit so
//! they can be compared directly.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Source of the current time.
///
/// Cache updates take a clock instead of calling `SystemTime::now()` so tests
/// can stamp snapshots with a fixed, known value.
pub trait Clock {
    fn now_millis(&self) -> Millis;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        to_millis(SystemTime::now())
    }
}

/// Convert a `SystemTime` to epoch milliseconds. Times before the epoch
/// collapse to 0.
pub fn to_millis(time: SystemTime) -> Millis {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) struct FixedClock(pub Millis);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_millis(&self) -> Millis {
        self.0
    }
}
