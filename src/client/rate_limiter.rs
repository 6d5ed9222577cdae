use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Enforces a minimum spacing between requests to one provider.
///
/// Each source owns its own limiter, so waiting here never delays another source.
#[derive(Debug)]
pub struct RateLimiter {
    last_request_time: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    #[must_use]
    pub const fn with_interval(min_interval: Duration) -> Self {
        Self {
            last_request_time: None,
            min_interval,
        }
    }

    /// Wait until it's safe to make a request
    pub async fn acquire(&mut self) {
        if let Some(wait_time) = self.time_until_ready() {
            debug!("Rate limiter: waiting {}ms", wait_time.as_millis());
            sleep(wait_time).await;
        }
        self.last_request_time = Some(Instant::now());
    }

    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Change the spacing, e.g. once an API key raises the allowance
    pub fn update_interval(&mut self, min_interval: Duration) {
        if min_interval != self.min_interval {
            debug!(
                "Rate limiter interval changed from {:?} to {:?}",
                self.min_interval, min_interval
            );
            self.min_interval = min_interval;
        }
    }

    /// Get time until next request is allowed
    #[must_use]
    pub fn time_until_ready(&self) -> Option<Duration> {
        self.last_request_time.and_then(|last_time| {
            let elapsed = Instant::now().duration_since(last_time);
            if elapsed >= self.min_interval {
                None
            } else {
                Some(self.min_interval - elapsed)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spacing() {
        let mut limiter = RateLimiter::with_interval(Duration::from_millis(500));

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_only_after_interval() {
        let mut limiter = RateLimiter::with_interval(Duration::from_secs(1));
        assert!(limiter.time_until_ready().is_none());

        limiter.acquire().await;
        assert!(limiter.time_until_ready().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.time_until_ready().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let mut limiter = RateLimiter::with_interval(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_update_interval() {
        let mut limiter = RateLimiter::with_interval(Duration::from_secs(1));
        limiter.update_interval(Duration::from_millis(100));
        assert_eq!(limiter.min_interval(), Duration::from_millis(100));
    }
}
