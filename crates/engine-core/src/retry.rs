use std::time::Duration;

/// Whether a failed call is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Preset for produce calls against a database.
    pub fn for_database() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }

    /// Delay before the retry following failed attempt `attempt` (zero
    /// based), or `None` once no attempts remain. Doubles per attempt up to
    /// `max_delay`.
    pub fn delay_for(&self, attempt: usize) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        if self.base_delay.is_zero() {
            return Some(Duration::ZERO);
        }

        let factor = 1u128 << attempt.min(6);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Some(Duration::from_millis(capped as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(300));

        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn single_attempt_never_retries() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100), Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_delay, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn zero_base_delay_retries_immediately() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.delay_for(0), Some(Duration::ZERO));
        assert_eq!(policy.delay_for(1), Some(Duration::ZERO));
        assert_eq!(policy.delay_for(2), None);
    }
}
