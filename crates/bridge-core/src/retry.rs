//! Retry budget for connection attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defines how often a connection attempt is repeated and how long to wait
/// between attempts.
///
/// Connect and reconnect share one policy value, so the attempt budget and the
/// interval can never be passed in swapped positions.
///
/// # Example
///
/// ```rust
/// use bridge_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(5, Duration::from_millis(200));
/// assert_eq!(policy.worst_case_sleep(), Duration::from_millis(800));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    ///
    /// A value of 0 is treated as 1: the operation is always tried once.
    pub max_attempts: u32,

    /// Fixed delay between two consecutive attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    /// 300 attempts at 100 ms intervals, roughly 30 seconds of retrying.
    fn default() -> Self {
        Self {
            max_attempts: 300,
            interval: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and interval.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Attempt budget with the "always try once" floor applied.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Longest total sleep one retry loop can spend before giving up.
    ///
    /// This is also the shutdown latency ceiling while a retry loop is running.
    pub fn worst_case_sleep(&self) -> Duration {
        self.interval * (self.attempts() - 1)
    }
}
