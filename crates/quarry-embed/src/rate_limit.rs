//! Sliding one-minute window limiter for outgoing API requests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

pub const WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    requests_per_minute: usize,
    sent: VecDeque<Instant>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_minute", &self.requests_per_minute)
            .field("in_window", &self.sent.len())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// A limit of zero is treated as one request per minute.
    #[must_use]
    pub fn new(requests_per_minute: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            sent: VecDeque::new(),
            clock,
        }
    }

    /// Wait until one more request fits in the trailing window, then record it.
    pub async fn acquire(&mut self) {
        loop {
            let now = self.clock.now();
            self.evict(now);
            if self.sent.len() < self.requests_per_minute {
                self.sent.push_back(now);
                return;
            }
            let Some(&oldest) = self.sent.front() else {
                continue;
            };
            let wait = (oldest + WINDOW).saturating_duration_since(now);
            tracing::debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                limit = self.requests_per_minute,
                "rate limit reached, waiting"
            );
            self.clock.sleep(wait).await;
        }
    }

    /// Number of requests recorded inside the trailing window.
    #[must_use]
    pub fn in_window(&mut self) -> usize {
        let now = self.clock.now();
        self.evict(now);
        self.sent.len()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&front) = self.sent.front() {
            if now.saturating_duration_since(front) >= WINDOW {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(rpm: usize) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        (RateLimiter::new(rpm, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn under_limit_does_not_wait() {
        let (mut limiter, clock) = limiter(3);
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(clock.sleeps().is_empty());
        assert_eq!(limiter.in_window(), 3);
    }

    #[tokio::test]
    async fn waits_for_oldest_to_leave_window() {
        let (mut limiter, clock) = limiter(2);
        limiter.acquire().await;
        clock.advance(Duration::from_secs(10));
        limiter.acquire().await;
        clock.advance(Duration::from_secs(5));

        limiter.acquire().await;
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(45)]);
        assert_eq!(limiter.in_window(), 2);
    }

    #[tokio::test]
    async fn window_slides_without_waiting() {
        let (mut limiter, clock) = limiter(1);
        limiter.acquire().await;
        clock.advance(WINDOW);
        limiter.acquire().await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn zero_limit_behaves_as_one() {
        let (mut limiter, clock) = limiter(0);
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(clock.sleeps(), vec![WINDOW]);
    }
}
