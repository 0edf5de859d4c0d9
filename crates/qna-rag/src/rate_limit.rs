//! Sliding-window limiter for outbound model calls
//!
//! One limiter is shared by every request in the process. A caller that
//! finds the window full waits until the oldest call leaves it.

use std::collections::VecDeque;
use std::time::Duration;

use qna_core::RateLimitConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// At most `max_calls` acquisitions in any `period`
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A `max_calls` of zero is treated as one
    pub fn new(max_calls: u32, period: Duration) -> Self {
        let max_calls = (max_calls as usize).max(1);
        Self {
            max_calls,
            period,
            window: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests, config.period())
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for a slot and record the call
    pub async fn acquire(&self) {
        loop {
            let deadline = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                self.evict_expired(&mut window, now);

                if window.len() < self.max_calls {
                    window.push_back(now);
                    return;
                }

                match window.front() {
                    Some(oldest) => *oldest + self.period,
                    None => now,
                }
            };

            tracing::debug!(
                wait_ms = deadline
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64,
                "Rate limit reached, waiting for window"
            );
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Slots free right now
    pub async fn available(&self) -> usize {
        let mut window = self.window.lock().await;
        self.evict_expired(&mut window, Instant::now());
        self.max_calls - window.len()
    }

    fn evict_expired(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.period {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_calls_within_quota_do_not_wait() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..10 {
            limiter.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_beyond_quota_waits_for_window() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..10 {
            limiter.acquire().await;
        }
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        limiter.acquire().await;
        assert_eq!(limiter.available().await, 0);

        // First call leaves the window at t=10, second at t=16
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(limiter.available().await, 1);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(10)));
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut waits = Vec::new();
        for handle in handles {
            waits.push(handle.await.unwrap().as_secs());
        }
        waits.sort_unstable();

        assert_eq!(waits, vec![0, 0, 10, 10, 20]);
    }

    #[test]
    fn test_zero_quota_treated_as_one() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 1);
    }
}
