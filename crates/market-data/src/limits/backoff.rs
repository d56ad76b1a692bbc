use std::time::Duration;

/// Exponential backoff schedule.
///
/// Attempt `n` (zero based) waits `min(base_delay * multiplier^n, max_delay)`.
#[derive(Clone, Debug)]
pub struct Backoff {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
}

impl Backoff {
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            multiplier: multiplier.max(1.0),
            max_delay,
            max_retries,
        }
    }

    /// Delay to wait before retry number `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let max_millis = self.max_delay.as_millis() as f64;

        if !millis.is_finite() || millis >= max_millis {
            self.max_delay
        } else {
            Duration::from_millis(millis as u64)
        }
    }

    /// True while `retries_done` is below the configured cap.
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_exponentially() {
        let backoff = Backoff::new(Duration::from_millis(100), 2.0, Duration::from_secs(10), 5);
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = Backoff::new(Duration::from_millis(100), 2.0, Duration::from_secs(1), 5);
        assert_eq!(backoff.delay_for(10), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_should_retry_respects_cap() {
        let backoff = Backoff::new(Duration::from_millis(1), 2.0, Duration::from_millis(10), 2);
        assert!(backoff.should_retry(0));
        assert!(backoff.should_retry(1));
        assert!(!backoff.should_retry(2));
    }

    #[test]
    fn test_multiplier_below_one_is_clamped() {
        let backoff = Backoff::new(Duration::from_millis(100), 0.5, Duration::from_secs(1), 1);
        assert_eq!(backoff.delay_for(4), Duration::from_millis(100));
    }
}
