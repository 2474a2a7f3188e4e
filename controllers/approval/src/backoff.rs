//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliations. The sequence grows more slowly
//! than exponential backoff, so a record stuck on a bad resource specification
//! keeps being retried at a bounded rate instead of drifting to very long
//! delays.
//!
//! With bounds 5s..300s the sequence is: 5s, 5s, 10s, 15s, 25s, 40s, 65s,
//! 105s, 170s, 275s, 300s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `min` twice and
/// capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff value
    prev: Duration,
    /// Next backoff value to hand out
    current: Duration,
    /// Maximum backoff value
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff bounded by `min` and `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;

        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);

        result
    }
}
