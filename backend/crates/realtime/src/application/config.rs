//! Application Configuration

use std::time::Duration;

use platform::rate_limit::RateLimitConfig;

/// Realtime gateway configuration
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Outbound frames buffered per connection
    pub outbound_queue: usize,
    /// Largest accepted inbound text frame
    pub max_message_bytes: usize,
    /// Handshakes per IP
    pub connection_rate_limit: RateLimitConfig,
    /// Inbound frames per IP, across that IP's connections
    pub message_rate_limit: RateLimitConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 64,
            max_message_bytes: 64 * 1024,
            connection_rate_limit: RateLimitConfig::new(10, Duration::from_secs(60)),
            message_rate_limit: RateLimitConfig::new(120, Duration::from_secs(60)),
        }
    }
}

impl RealtimeConfig {
    /// Create config for development (looser connection limit for hot reloads)
    pub fn development() -> Self {
        Self {
            connection_rate_limit: RateLimitConfig::new(60, Duration::from_secs(60)),
            ..Default::default()
        }
    }
}
