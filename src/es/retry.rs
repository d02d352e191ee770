//! Retry policy for bulk submissions.

use std::time::Duration;

/// Delay schedule for re-submitting a failed bulk request.
///
/// The policy is injected into [`crate::es::EsClient`] at construction, so
/// callers (and tests) decide how patient a failed chunk is. The default
/// matches the classic feeder behavior: 3 attempts, 10 seconds between
/// them. Delays double per failed attempt up to `max_delay`; with the
/// default's equal base and max this degenerates to a flat wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per chunk, the first included. Zero is treated as 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy with explicit attempts and a doubling delay capped at
    /// `max_delay`.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Policy that retries `max_attempts` times with no delay at all.
    /// Intended for tests.
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Effective attempt budget (at least 1).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    ///
    /// Doubles per attempt, capped at `max_delay`. There is no sleep after
    /// the final attempt; callers stop asking once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let exp = self
            .base_delay
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        exp.min(self.max_delay)
    }
}
