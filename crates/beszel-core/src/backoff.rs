use std::time::Duration;

use crate::config::BackoffPolicy;

/// Exponential retry delay after transient poll failures.
///
/// Each failure returns the current delay and doubles it up to the policy
/// maximum. A success (or a permanent failure) resets to the initial delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let initial = policy.initial.max(Duration::from_millis(1));
        let max = policy.max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            attempt: 0,
        }
    }

    /// Record a transient failure and return the delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempt = self.attempt.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempt = 0;
    }

    /// Consecutive transient failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
