//! Simulated driver system clock.

use std::time::{Duration, Instant};

/// How the simulated system clock advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Starts at `start_us` and advances by `tick_us` on every read.
    ///
    /// Lets tests drive periodic work (timesync) without waiting.
    Manual { start_us: i64, tick_us: i64 },
    /// Microseconds elapsed on the host monotonic clock since the API was created.
    Host,
}

impl Default for ClockMode {
    fn default() -> Self {
        ClockMode::Manual {
            start_us: 0,
            tick_us: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SimClock {
    mode: ClockMode,
    now_us: i64,
    origin: Instant,
}

impl SimClock {
    pub(crate) fn new(mode: ClockMode) -> Self {
        let now_us = match mode {
            ClockMode::Manual { start_us, .. } => start_us,
            ClockMode::Host => 0,
        };
        Self {
            mode,
            now_us,
            origin: Instant::now(),
        }
    }

    /// Read the clock, advancing a manual clock by one tick.
    pub(crate) fn read(&mut self) -> i64 {
        match self.mode {
            ClockMode::Manual { tick_us, .. } => {
                let now = self.now_us;
                self.now_us += tick_us;
                now
            }
            ClockMode::Host => duration_us(self.origin.elapsed()),
        }
    }

    /// Read without advancing.
    pub(crate) fn peek(&self) -> i64 {
        match self.mode {
            ClockMode::Manual { .. } => self.now_us,
            ClockMode::Host => duration_us(self.origin.elapsed()),
        }
    }
}

fn duration_us(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_ticks_per_read() {
        let mut clock = SimClock::new(ClockMode::Manual {
            start_us: 10,
            tick_us: 5,
        });
        assert_eq!(clock.read(), 10);
        assert_eq!(clock.read(), 15);
        assert_eq!(clock.peek(), 20);
    }

    #[test]
    fn test_host_clock_is_monotonic() {
        let mut clock = SimClock::new(ClockMode::Host);
        let a = clock.read();
        let b = clock.read();
        assert!(b >= a);
    }
}
