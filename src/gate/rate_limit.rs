use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

impl RateDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Sliding-window limiter keyed by client address.
///
/// Each bucket holds the instants of accepted requests, oldest first.
/// Instants that fell out of the window are pruned on the next check.
/// Buckets of clients that went quiet for a whole window are dropped by a
/// sweep that runs at most once per window.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    buckets: Mutex<Buckets>,
}

#[derive(Debug, Default)]
struct Buckets {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(Buckets::default()),
        }
    }

    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_seconds))
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        self.sweep(&mut buckets, now);
        let bucket = buckets.clients.entry(client.to_string()).or_default();

        while let Some(&oldest) = bucket.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if let Some(&oldest) = bucket.front()
            && bucket.len() >= self.max_requests
        {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(oldest));
            return RateDecision::Limited { retry_after };
        }

        bucket.push_back(now);
        RateDecision::Allowed {
            remaining: self.max_requests.saturating_sub(bucket.len()),
        }
    }

    /// Number of clients currently holding a bucket.
    pub fn tracked_clients(&self) -> usize {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.clients.len()
    }

    fn sweep(&self, buckets: &mut Buckets, now: Instant) {
        if buckets
            .last_sweep
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
        {
            return;
        }

        let window = self.window;
        buckets.clients.retain(|_, bucket| {
            bucket
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < window)
        });
        buckets.last_sweep = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixth_request_in_window_is_limited() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..5 {
            let decision = limiter.check_at("10.0.0.1", start + Duration::from_secs(i));
            assert!(decision.is_allowed(), "request {i} should pass");
        }

        let sixth = limiter.check_at("10.0.0.1", start + Duration::from_secs(10));
        assert_eq!(
            sixth,
            RateDecision::Limited {
                retry_after: Duration::from_secs(50)
            }
        );
    }

    #[test]
    fn test_requests_pass_again_after_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.check_at("client", start + Duration::from_secs(i)).is_allowed());
        }
        assert!(!limiter.check_at("client", start + Duration::from_secs(30)).is_allowed());

        let later = start + Duration::from_secs(65);
        assert_eq!(
            limiter.check_at("client", later),
            RateDecision::Allowed { remaining: 4 }
        );
    }

    #[test]
    fn test_rejected_requests_are_not_recorded() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("c", start).is_allowed());
        assert!(limiter.check_at("c", start + Duration::from_secs(1)).is_allowed());
        for i in 2..8 {
            assert!(!limiter.check_at("c", start + Duration::from_secs(i)).is_allowed());
        }

        // Only the two accepted requests occupy the window.
        assert!(limiter.check_at("c", start + Duration::from_secs(11)).is_allowed());
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_idle_clients_are_forgotten() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10));
        let start = Instant::now();

        for i in 0..100 {
            assert!(limiter.check_at(&format!("10.0.0.{i}"), start).is_allowed());
        }
        assert_eq!(limiter.tracked_clients(), 100);

        // One window later only the newcomer is left.
        assert!(limiter.check_at("10.0.1.1", start + Duration::from_secs(11)).is_allowed());
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
