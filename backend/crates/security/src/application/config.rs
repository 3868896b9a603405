//! Application Configuration
//!
//! Thresholds and intervals for the abuse-mitigation layer.

use std::time::Duration;

use kernel::clock::duration_ms;
use platform::rate_limit::RateLimitConfig;

/// Security application configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Failures per `(ip, identifier)` before the IP is blocked
    pub failure_threshold: u32,
    /// Failure counter lifetime, measured from the first failure
    pub failure_window: Duration,
    /// How long a block lasts
    pub block_duration: Duration,
    /// Alert log capacity
    pub alert_capacity: usize,
    /// Sweeper tick
    pub sweep_interval: Duration,
    /// How often the sweeper purges old alerts
    pub alert_cleanup_interval: Duration,
    /// Alerts older than this are purged
    pub alert_max_age: Duration,
    /// Generic per-(ip, path) API limit
    pub api_rate_limit: RateLimitConfig,
    /// Per-ip login limit
    pub login_rate_limit: RateLimitConfig,
    /// Max body size the input scanner buffers
    pub max_scanned_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(15 * 60),
            block_duration: Duration::from_secs(60 * 60),
            alert_capacity: 1000,
            sweep_interval: Duration::from_secs(60),
            alert_cleanup_interval: Duration::from_secs(60 * 60),
            alert_max_age: Duration::from_secs(24 * 60 * 60),
            api_rate_limit: RateLimitConfig::new(100, Duration::from_secs(15 * 60)),
            login_rate_limit: RateLimitConfig::new(10, Duration::from_secs(15 * 60)),
            max_scanned_body_bytes: 1024 * 1024,
        }
    }
}

impl SecurityConfig {
    /// Create config for development (looser API limit)
    pub fn development() -> Self {
        Self {
            api_rate_limit: RateLimitConfig::new(1000, Duration::from_secs(15 * 60)),
            ..Default::default()
        }
    }

    pub fn failure_window_ms(&self) -> i64 {
        duration_ms(self.failure_window)
    }

    pub fn block_duration_ms(&self) -> i64 {
        duration_ms(self.block_duration)
    }

    pub fn alert_max_age_ms(&self) -> i64 {
        duration_ms(self.alert_max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.failure_window_ms(), 900_000);
        assert_eq!(config.block_duration_ms(), 3_600_000);
        assert_eq!(config.alert_capacity, 1000);
        assert_eq!(config.api_rate_limit.max_requests, 100);
        assert_eq!(config.login_rate_limit.max_requests, 10);
    }
}
