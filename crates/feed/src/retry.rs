use std::time::Duration;

/// Reconnect schedule of a stream ingestor.
///
/// Delays double from `initial` up to `max`. Retrying never stops; after
/// `escalate_after` consecutive failures the next delay is flagged so the
/// caller can raise the log level once for that failure streak.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial: Duration,
    max: Duration,
    escalate_after: u32,
    current: Duration,
    failures: u32,
}

/// One scheduled retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDelay {
    pub delay: Duration,
    /// Consecutive failures so far, this one included.
    pub attempt: u32,
    /// True exactly once per streak, when it reaches `escalate_after`.
    pub escalate: bool,
}

impl RetryPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            escalate_after: 5,
            current: initial,
            failures: 0,
        }
    }

    pub fn with_escalate_after(mut self, failures: u32) -> Self {
        self.escalate_after = failures.max(1);
        self
    }

    /// Record a failure and return how long to wait before reconnecting.
    pub fn next_delay(&mut self) -> RetryDelay {
        self.failures = self.failures.saturating_add(1);
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        RetryDelay {
            delay,
            attempt: self.failures,
            escalate: self.failures == self.escalate_after,
        }
    }

    /// Called once a connection has proven healthy.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_max() {
        let mut policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..8).map(|_| policy.next_delay().delay.as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn escalates_once_per_streak() {
        let mut policy = RetryPolicy::default().with_escalate_after(3);
        let flags: Vec<bool> = (0..6).map(|_| policy.next_delay().escalate).collect();
        assert_eq!(flags, vec![false, false, true, false, false, false]);

        policy.reset();
        assert_eq!(policy.consecutive_failures(), 0);
        let flags: Vec<bool> = (0..3).map(|_| policy.next_delay().escalate).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
        for _ in 0..5 {
            policy.next_delay();
        }
        policy.reset();
        let next = policy.next_delay();
        assert_eq!(next.delay, Duration::from_millis(100));
        assert_eq!(next.attempt, 1);
    }
}
