use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff with random jitter, injected wherever the
/// pipeline talks to a flaky collaborator (classifier, notification sink).
/// Delay after the n-th failure is `base * multiplier^n` plus 0..max_jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 3,
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// No sleeps, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_jitter: Duration::ZERO,
        }
    }

    /// Backoff delay after `attempt` (0-based) failed tries.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay * self.multiplier.saturating_pow(attempt);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        backoff + jitter
    }
}
