use parking_lot::Mutex;
use std::{
    fmt,
    time::{Duration, Instant},
};

// -----------------------------------------------------------------------------
// ----- Clock -----------------------------------------------------------------

/// Monotonic time source shared by the rate limiter and the session manager.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

// -----------------------------------------------------------------------------
// ----- SystemClock -----------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// -----------------------------------------------------------------------------
// ----- ManualClock -----------------------------------------------------------

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Jump to `at` past the origin. Never moves backwards.
    pub fn set(&self, at: Duration) {
        let mut offset = self.offset.lock();
        if at > *offset {
            *offset = at;
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_monotonic() {
        let clock = ManualClock::new();
        let t0 = clock.now();

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(250));

        clock.set(Duration::from_millis(100));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));

        clock.set(Duration::from_millis(1001));
        assert_eq!(clock.now() - t0, Duration::from_millis(1001));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
