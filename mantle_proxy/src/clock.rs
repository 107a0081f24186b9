// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host clock backed by [`Instant`].

use std::time::Instant;

use mantle_core::time::{Duration, HostTime, Timebase};

/// Nanosecond clock measured from its creation.
///
/// Copies share the same origin, so both sides of a cross-thread pipeline
/// read comparable times.
#[derive(Clone, Copy, Debug)]
pub struct HostClock {
    origin: Instant,
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock {
    /// Creates a clock whose zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Current time in nanoseconds since the origin.
    #[must_use]
    pub fn now(&self) -> HostTime {
        let nanos = self.origin.elapsed().as_nanos();
        HostTime(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Ticks are nanoseconds.
    #[must_use]
    pub const fn timebase(&self) -> Timebase {
        Timebase::NANOS
    }

    /// Converts a standard duration to clock ticks.
    #[must_use]
    pub fn ticks(duration: std::time::Duration) -> Duration {
        Duration(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic_and_shared_by_copies() {
        let clock = HostClock::new();
        let copy = clock;
        let a = clock.now();
        let b = copy.now();
        assert!(b >= a);
        assert_eq!(
            HostClock::ticks(std::time::Duration::from_millis(2)),
            Duration(2_000_000)
        );
    }
}
