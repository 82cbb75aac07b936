use std::time::Duration;

/// Bounded exponential backoff for part transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, so a part is tried at most
    /// `max_retries + 1` times.
    pub max_retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1).max(1)
    }

    /// Delay before the attempt after `attempt` (1-based) failed:
    /// `base * 2^(attempt-1)`, capped at the configured maximum.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as u32;
        let multiplier = 2u64.saturating_pow(exponent);
        let delay = self.backoff_base_ms.saturating_mul(multiplier);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt_until_the_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff_for(5), Duration::from_millis(8_000));
        assert_eq!(policy.backoff_for(12), Duration::from_millis(8_000));
    }

    #[test]
    fn at_least_one_attempt_even_with_zero_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn defaults_match_the_documented_knobs() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
    }
}
