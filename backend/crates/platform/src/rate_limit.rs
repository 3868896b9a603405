//! Rate Limiting Infrastructure
//!
//! Sliding-window log: a request is allowed when fewer than `max_requests`
//! timestamps fall inside the trailing window. Unlike fixed buckets, a burst
//! straddling a bucket boundary is still limited.

use std::collections::VecDeque;
use std::time::Duration;

use kernel::clock::duration_ms;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn window_ms(&self) -> i64 {
        duration_ms(self.window)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// When the oldest counted request leaves the window
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    /// Time until a denied caller may retry
    pub fn retry_after(&self, now_ms: i64) -> Duration {
        Duration::from_millis(self.reset_at_ms.saturating_sub(now_ms).max(0) as u64)
    }
}

/// Timestamps of accepted requests, oldest first
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowLog {
    hits: VecDeque<i64>,
}

impl SlidingWindowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps at or before `now_ms - window_ms`
    pub fn prune(&mut self, now_ms: i64, window_ms: i64) {
        let cutoff = now_ms.saturating_sub(window_ms);
        while self.hits.front().is_some_and(|&t| t <= cutoff) {
            self.hits.pop_front();
        }
    }

    /// Prune, then record `now_ms` if under the limit
    pub fn try_acquire(&mut self, now_ms: i64, config: &RateLimitConfig) -> RateLimitResult {
        let window_ms = config.window_ms();
        self.prune(now_ms, window_ms);

        let limit = config.max_requests as usize;
        if self.hits.len() >= limit {
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_at_ms: self.reset_at(now_ms, window_ms),
            };
        }

        self.hits.push_back(now_ms);
        RateLimitResult {
            allowed: true,
            remaining: (limit - self.hits.len()) as u32,
            reset_at_ms: self.reset_at(now_ms, window_ms),
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Most recent accepted request
    pub fn last_hit_ms(&self) -> Option<i64> {
        self.hits.back().copied()
    }

    fn reset_at(&self, now_ms: i64, window_ms: i64) -> i64 {
        self.hits
            .front()
            .map(|&oldest| oldest.saturating_add(window_ms))
            .unwrap_or(now_ms)
    }
}
