//! Millisecond tick arithmetic for the control loop.
//!
//! Loop time is a free-running `u32` millisecond counter that wraps roughly
//! every 49.7 days.  Every comparison goes through wrapping subtraction so a
//! deadline set just before the wrap still fires just after it.

use std::time::Instant;

use time::OffsetDateTime;

/// Monotonic loop time in milliseconds (wrapping).
pub type Millis = u32;

/// Process-local monotonic millisecond counter.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds since start, truncated to the wrapping counter.
    pub fn now_ms(&self) -> Millis {
        self.started.elapsed().as_millis() as Millis
    }

    /// Whole seconds since start.
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// `true` once `now` is at or past `at`, tolerant of counter wraparound.
///
/// Valid as long as the two instants are less than ~24.8 days apart, which
/// the 30 s backoff ceiling guarantees.
pub fn deadline_reached(now: Millis, at: Millis) -> bool {
    (now.wrapping_sub(at) as i32) >= 0
}

/// Wall-clock unix seconds for payload timestamps.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// Fixed-interval trigger for periodic loop work (safety sampling, status,
/// telemetry).  First fires one full interval after `start`.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval_ms: Millis,
    last: Millis,
}

impl Cadence {
    pub fn new(interval_ms: Millis, start: Millis) -> Self {
        Self {
            interval_ms,
            last: start,
        }
    }

    /// Returns `true` (and re-arms) when a full interval has elapsed.
    pub fn due(&mut self, now: Millis) -> bool {
        if now.wrapping_sub(self.last) >= self.interval_ms {
            self.last = now;
            true
        } else {
            false
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- deadline_reached ----------------------------------------------------

    #[test]
    fn deadline_not_reached_before() {
        assert!(!deadline_reached(999, 1000));
    }

    #[test]
    fn deadline_reached_exactly() {
        assert!(deadline_reached(1000, 1000));
    }

    #[test]
    fn deadline_reached_after() {
        assert!(deadline_reached(5000, 1000));
    }

    #[test]
    fn deadline_across_wraparound() {
        let at = (u32::MAX - 100).wrapping_add(1000); // wraps to 899
        assert_eq!(at, 899);
        assert!(!deadline_reached(u32::MAX - 50, at));
        assert!(!deadline_reached(898, at));
        assert!(deadline_reached(899, at));
        assert!(deadline_reached(2000, at));
    }

    // -- Cadence ---------------------------------------------------------------

    #[test]
    fn cadence_waits_one_interval() {
        let mut c = Cadence::new(300, 0);
        assert!(!c.due(0));
        assert!(!c.due(299));
        assert!(c.due(300));
    }

    #[test]
    fn cadence_rearms_after_firing() {
        let mut c = Cadence::new(300, 0);
        assert!(c.due(350));
        assert!(!c.due(600));
        assert!(c.due(650));
    }

    #[test]
    fn cadence_survives_wraparound() {
        let mut c = Cadence::new(300, u32::MAX - 100);
        assert!(!c.due(u32::MAX));
        assert!(!c.due(198));
        assert!(c.due(199));
    }

    // -- Clocks ------------------------------------------------------------------

    #[test]
    fn unix_now_is_recent() {
        let ts = unix_now();
        // After 2024-01-01 and before 2040-01-01.
        assert!(ts > 1_704_067_200, "timestamp too old: {ts}");
        assert!(ts < 2_208_988_800, "timestamp too far in future: {ts}");
    }

    #[test]
    fn monotonic_clock_starts_near_zero() {
        let clock = MonotonicClock::start();
        assert!(clock.now_ms() < 1_000);
        assert_eq!(clock.uptime_secs(), 0);
    }
}
