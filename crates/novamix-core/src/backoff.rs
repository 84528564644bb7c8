//! Reconnect backoff schedule.

use std::time::Duration;

/// Exponential backoff used by both the device and PipeWire reconnect
/// paths.
///
/// Starts at 500 ms, doubles on every failure and caps at 30 s, so a
/// missing device or dead audio server is retried indefinitely without
/// busy-looping. A success resets the schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Default initial delay.
    pub const INITIAL: Duration = Duration::from_millis(500);
    /// Default delay ceiling.
    pub const MAX: Duration = Duration::from_secs(30);

    /// Create a backoff with the default schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bounds(Self::INITIAL, Self::MAX)
    }

    /// Create a backoff with explicit bounds.
    #[must_use]
    pub fn with_bounds(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// The delay to sleep before the next attempt, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// The delay the next failure would produce, without advancing.
    #[must_use]
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Reset the schedule after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(16));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_resets_on_success() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.peek(), Duration::from_millis(500));
        assert_eq!(backoff.peek(), Duration::from_millis(500));
        backoff.next_delay();
        assert_eq!(backoff.peek(), Duration::from_secs(1));
    }
}
