use std::time::Duration;
use tokio::time::Instant;

/// What `send()` does when the rate window is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// Queue the message (bounded) and transmit it when the window resets.
    #[default]
    QueueWhenLimited,
    /// Reject the send with `RealtimeError::RateLimited`.
    RejectWhenLimited,
}

/// Read-only view of the current rate window, exposed through stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub is_limited: bool,
    pub messages_in_window: u32,
    pub window_start: Instant,
}

/// Fixed-window message-rate guard: at most `limit` admissions per `window`.
///
/// `try_admit` is the only mutating entry point; the stats snapshot is a pure
/// read and reflects the state as of the last admission check.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    window_start: Instant,
    messages_in_window: u32,
    is_limited: bool,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            window_start: Instant::now(),
            messages_in_window: 0,
            is_limited: false,
        }
    }

    /// Admit one message if doing so keeps the window within its limit.
    ///
    /// An expired window is reset first. `is_limited` afterwards tells
    /// whether the next admission would be refused.
    pub fn try_admit(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.messages_in_window = 0;
        }

        if self.messages_in_window < self.limit {
            self.messages_in_window += 1;
            self.is_limited = self.messages_in_window == self.limit;
            true
        } else {
            self.is_limited = true;
            false
        }
    }

    /// Time until the current window expires and admissions resume.
    pub fn time_until_reset(&self) -> Duration {
        (self.window_start + self.window).saturating_duration_since(Instant::now())
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            is_limited: self.is_limited,
            messages_in_window: self.messages_in_window,
            window_start: self.window_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admissions_never_exceed_limit() {
        let mut limiter = RateLimiter::new(3, Duration::from_millis(1000));

        let admitted = (0..10).filter(|_| limiter.try_admit()).count();
        assert_eq!(admitted, 3);
        assert!(limiter.snapshot().is_limited);
        assert_eq!(limiter.snapshot().messages_in_window, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_call_admitted_after_window_elapses() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(1000));

        assert!(limiter.try_admit());
        assert!(limiter.try_admit());
        assert!(!limiter.try_admit());

        tokio::time::advance(Duration::from_millis(1000)).await;

        assert!(limiter.try_admit());
        assert_eq!(limiter.snapshot().messages_in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_limited_set_on_last_admission() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(1000));

        assert!(limiter.try_admit());
        assert!(!limiter.snapshot().is_limited);
        assert!(limiter.try_admit());
        assert!(limiter.snapshot().is_limited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_reset_counts_down() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(1000));
        assert!(limiter.try_admit());

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(limiter.time_until_reset(), Duration::from_millis(600));

        tokio::time::advance(Duration::from_millis(700)).await;
        assert_eq!(limiter.time_until_reset(), Duration::ZERO);
    }
}
