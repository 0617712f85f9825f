use crate::types::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY, DEFAULT_RECONNECT_FACTOR,
    DEFAULT_RECONNECT_MAX_DELAY,
};
use rand::Rng;
use std::time::Duration;

/// Reconnect schedule: exponential backoff with a hard cap and random jitter.
///
/// The jitter spreads reconnection attempts of many clients over time so a
/// server restart does not produce a synchronized reconnection storm.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    factor: f64,
    max_delay: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, factor: f64, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            factor,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before retrying after `attempt` consecutive failures.
    ///
    /// `attempt` starts at 0 and resets on every successful open or explicit
    /// connect. The result is jittered into `[cap / 2, cap]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis() as f64 * self.factor.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_millis() as f64);
        let jittered = capped * rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_millis(jittered as u64)
    }

    /// After this many consecutive failures the caller stops scheduling
    /// retries and surfaces a terminal error state.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_RECONNECT_BASE_DELAY),
            DEFAULT_RECONNECT_FACTOR,
            Duration::from_millis(DEFAULT_RECONNECT_MAX_DELAY),
            DEFAULT_MAX_RECONNECT_ATTEMPTS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_with_attempts() {
        let policy = ReconnectPolicy::new(Duration::from_millis(1000), 2.0, Duration::from_secs(60), 5);

        for attempt in 0..4u32 {
            let cap = 1000.0 * 2.0f64.powi(attempt as i32);
            for _ in 0..50 {
                let delay = policy.delay_for(attempt).as_millis() as f64;
                assert!(delay >= cap * 0.5 - 1.0, "attempt {}: {} below jitter floor", attempt, delay);
                assert!(delay <= cap + 1.0, "attempt {}: {} above cap", attempt, delay);
            }
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = ReconnectPolicy::new(Duration::from_millis(1000), 2.0, Duration::from_millis(10000), 5);

        for _ in 0..50 {
            let delay = policy.delay_for(30);
            assert!(delay <= Duration::from_millis(10000));
            assert!(delay >= Duration::from_millis(4999));
        }
    }
}
