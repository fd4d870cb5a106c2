//! Send-rate limiting for Bot API uploads.
//!
//! Telegram allows roughly one message per second per chat; sending
//! archive volumes back to back without a gap triggers 429 responses.
//! The limiter enforces a minimum interval between sends and absorbs
//! the server's retry-after penalties.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Minimum-interval gate for outgoing API calls.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed sends.
    min_interval: Duration,

    /// Earliest instant the next send may happen.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Creates a rate limiter from seconds.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Waits until a send is allowed, then reserves the next slot.
    ///
    /// Returns the duration waited (zero if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next_allowed = self.next_allowed.lock().await;

        let wait_duration = next_allowed
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO);

        if !wait_duration.is_zero() {
            debug!("Rate limiter: waiting {:?} before next send", wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        *next_allowed = Some(Instant::now() + self.min_interval);
        wait_duration
    }

    /// Checks if a send is currently allowed without blocking.
    pub async fn is_allowed(&self) -> bool {
        let next_allowed = self.next_allowed.lock().await;
        next_allowed.is_none_or(|at| Instant::now() >= at)
    }

    /// Returns the time remaining until the next send is allowed.
    pub async fn time_until_allowed(&self) -> Duration {
        let next_allowed = self.next_allowed.lock().await;
        next_allowed
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Pushes the next allowed send out by a server-imposed penalty.
    ///
    /// Used when Telegram answers with a retry-after duration; the wait
    /// happens in the next `wait_and_acquire`, not here.
    pub async fn apply_penalty(&self, penalty: Duration) {
        let mut next_allowed = self.next_allowed.lock().await;
        let penalized = Instant::now() + penalty;
        *next_allowed = Some(next_allowed.map_or(penalized, |at| at.max(penalized)));
    }

    /// Resets the rate limiter, allowing an immediate send.
    pub async fn reset(&self) {
        let mut next_allowed = self.next_allowed.lock().await;
        *next_allowed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_send_is_free() {
        let limiter = RateLimiter::from_secs(1);
        assert!(limiter.is_allowed().await);

        let waited = limiter.wait_and_acquire().await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_subsequent_send_must_wait() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        limiter.wait_and_acquire().await;
        assert!(!limiter.is_allowed().await);
        assert!(limiter.time_until_allowed().await > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_penalty_extends_wait() {
        let limiter = RateLimiter::new(Duration::from_millis(10));

        limiter.wait_and_acquire().await;
        limiter.apply_penalty(Duration::from_secs(60)).await;

        let remaining = limiter.time_until_allowed().await;
        assert!(remaining > Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_penalty_never_shortens_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(60));

        limiter.wait_and_acquire().await;
        limiter.apply_penalty(Duration::from_millis(1)).await;

        let remaining = limiter.time_until_allowed().await;
        assert!(remaining > Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_reset() {
        let limiter = RateLimiter::from_secs(60);

        limiter.wait_and_acquire().await;
        assert!(!limiter.is_allowed().await);

        limiter.reset().await;
        assert!(limiter.is_allowed().await);
    }
}
