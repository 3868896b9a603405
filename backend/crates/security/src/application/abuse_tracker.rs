//! Abuse Tracker
//!
//! In-memory failed-login counters, per-endpoint sliding-window rate
//! limits and a blocked-IP set, all with time-based expiry.
//!
//! Every map is a `DashMap`, so updates to one key are serialized by the
//! shard lock and unrelated keys do not contend. Expiry is evaluated
//! lazily on access and eagerly by [`AbuseTracker::sweep`], which the
//! periodic sweeper calls.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kernel::clock::SharedClock;
use platform::rate_limit::{RateLimitConfig, RateLimitResult, SlidingWindowLog};
use serde::Serialize;

use crate::application::alert_log::AlertLog;
use crate::application::config::SecurityConfig;
use crate::domain::entities::{AlertKind, BlockedIp, FailedAttemptRecord, NewAlert, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FailureKey {
    ip: String,
    identifier: String,
}

#[derive(Debug, Clone)]
struct FailureEntry {
    count: u32,
    first_attempt_at: i64,
    last_attempt_at: i64,
    expires_at: i64,
}

impl FailureEntry {
    fn start(now_ms: i64, window_ms: i64) -> Self {
        Self {
            count: 0,
            first_attempt_at: now_ms,
            last_attempt_at: now_ms,
            expires_at: now_ms.saturating_add(window_ms),
        }
    }

    #[inline]
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateKey {
    ip: String,
    endpoint: String,
}

#[derive(Debug, Default)]
struct RateEntry {
    log: SlidingWindowLog,
    window_ms: i64,
    /// Set on the first denial, cleared on the next allow
    throttled: bool,
}

/// Result of [`AbuseTracker::record_failed_attempt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttemptOutcome {
    /// Failures for this `(ip, identifier)` in the current window
    pub count: u32,
    /// This call crossed the threshold
    pub threshold_reached: bool,
    /// IP is blocked after this call
    pub ip_blocked: bool,
}

/// Counts removed by [`AbuseTracker::sweep`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired_failures: usize,
    pub expired_blocks: usize,
    pub dropped_rate_limit_keys: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_failures == 0 && self.expired_blocks == 0 && self.dropped_rate_limit_keys == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub blocked_ips: usize,
    pub failed_attempt_records: usize,
    pub rate_limit_keys: usize,
}

/// Identifiers are compared case-insensitively, ignoring surrounding space
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

pub struct AbuseTracker {
    config: Arc<SecurityConfig>,
    clock: SharedClock,
    alerts: Arc<AlertLog>,
    failures: DashMap<FailureKey, FailureEntry>,
    blocked: DashMap<String, BlockedIp>,
    rate_limits: DashMap<RateKey, RateEntry>,
}

impl AbuseTracker {
    pub fn new(config: Arc<SecurityConfig>, clock: SharedClock, alerts: Arc<AlertLog>) -> Self {
        Self {
            config,
            clock,
            alerts,
            failures: DashMap::new(),
            blocked: DashMap::new(),
            rate_limits: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn alerts(&self) -> &Arc<AlertLog> {
        &self.alerts
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    // ------------------------------------------------------------------
    // Failed logins
    // ------------------------------------------------------------------

    /// Count a failure; block the IP when the count reaches the threshold
    pub fn record_failed_attempt(&self, ip: &str, identifier: &str) -> FailedAttemptOutcome {
        let now = self.clock.now_ms();
        let identifier = normalize_identifier(identifier);
        let window_ms = self.config.failure_window_ms();

        // Guard dropped before touching the other maps
        let count = {
            let mut entry = self
                .failures
                .entry(FailureKey {
                    ip: ip.to_string(),
                    identifier: identifier.clone(),
                })
                .or_insert_with(|| FailureEntry::start(now, window_ms));
            if entry.is_expired(now) {
                *entry = FailureEntry::start(now, window_ms);
            }
            entry.count = entry.count.saturating_add(1);
            entry.last_attempt_at = now;
            entry.count
        };

        tracing::warn!(ip = %ip, identifier = %identifier, count, "Failed login attempt");

        let threshold_reached = count == self.config.failure_threshold;
        if threshold_reached {
            self.alerts.record(
                NewAlert::new(
                    AlertKind::RepeatedFailedLogins,
                    Severity::High,
                    format!("{count} failed login attempts"),
                )
                .with_ip(ip)
                .with_identifier(identifier.clone())
                .with_context(serde_json::json!({ "count": count })),
            );
            if !self.is_blocked(ip) {
                self.block_ip(ip, "Too many failed login attempts");
            }
        }

        FailedAttemptOutcome {
            count,
            threshold_reached,
            ip_blocked: self.is_blocked(ip),
        }
    }

    /// Forgive prior failures for `(ip, identifier)`
    pub fn record_success(&self, ip: &str, identifier: &str) -> bool {
        let key = FailureKey {
            ip: ip.to_string(),
            identifier: normalize_identifier(identifier),
        };
        self.failures.remove(&key).is_some()
    }

    /// Live failure count (0 when absent or expired)
    pub fn failure_count(&self, ip: &str, identifier: &str) -> u32 {
        let now = self.clock.now_ms();
        let key = FailureKey {
            ip: ip.to_string(),
            identifier: normalize_identifier(identifier),
        };
        self.failures
            .get(&key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.count)
            .unwrap_or(0)
    }

    /// Non-expired failure records, most recent first
    pub fn failed_attempts(&self) -> Vec<FailedAttemptRecord> {
        let now = self.clock.now_ms();
        let mut records: Vec<_> = self
            .failures
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .map(|e| FailedAttemptRecord {
                ip: e.key().ip.clone(),
                identifier: e.key().identifier.clone(),
                count: e.value().count,
                first_attempt_at: e.value().first_attempt_at,
                last_attempt_at: e.value().last_attempt_at,
                expires_at: e.value().expires_at,
            })
            .collect();
        records.sort_by(|a, b| b.last_attempt_at.cmp(&a.last_attempt_at));
        records
    }

    /// Clear all records, those of one IP, one identifier, or one pair
    pub fn clear_failed_attempts(&self, ip: Option<&str>, identifier: Option<&str>) -> usize {
        let identifier = identifier.map(normalize_identifier);
        let before = self.failures.len();
        self.failures.retain(|key, _| {
            let ip_matches = ip.is_none_or(|ip| key.ip == ip);
            let id_matches = identifier.as_deref().is_none_or(|id| key.identifier == id);
            !(ip_matches && id_matches)
        });
        let cleared = before.saturating_sub(self.failures.len());
        tracing::info!(ip = ?ip, identifier = ?identifier, cleared, "Cleared failed login records");
        cleared
    }

    // ------------------------------------------------------------------
    // Blocked IPs
    // ------------------------------------------------------------------

    pub fn is_blocked(&self, ip: &str) -> bool {
        let now = self.clock.now_ms();
        let active = match self.blocked.get(ip) {
            Some(entry) => entry.is_active(now),
            None => return false,
        };
        if !active {
            self.blocked.remove_if(ip, |_, b| !b.is_active(now));
        }
        active
    }

    /// Block `ip` for the configured duration, replacing any existing block
    pub fn block_ip(&self, ip: &str, reason: &str) -> BlockedIp {
        let now = self.clock.now_ms();
        let block = BlockedIp {
            ip: ip.to_string(),
            reason: reason.to_string(),
            blocked_at: now,
            expires_at: now.saturating_add(self.config.block_duration_ms()),
        };
        self.blocked.insert(ip.to_string(), block.clone());

        tracing::warn!(ip = %ip, reason = %reason, expires_at = block.expires_at, "IP blocked");
        self.alerts.record(
            NewAlert::new(AlertKind::IpBlocked, Severity::Medium, format!("IP blocked: {reason}"))
                .with_ip(ip)
                .with_context(serde_json::json!({
                    "reason": reason,
                    "expiresAt": block.expires_at,
                })),
        );
        block
    }

    /// Lift a block and forget the IP's failure records
    pub fn unblock_ip(&self, ip: &str) -> bool {
        let removed = self.blocked.remove(ip).is_some();
        self.failures.retain(|key, _| key.ip != ip);

        if removed {
            tracing::info!(ip = %ip, "IP unblocked");
            self.alerts.record(
                NewAlert::new(AlertKind::IpUnblocked, Severity::Low, "IP unblocked").with_ip(ip),
            );
        }
        removed
    }

    /// Active blocks, most recent first
    pub fn blocked_ips(&self) -> Vec<BlockedIp> {
        let now = self.clock.now_ms();
        let mut blocks: Vec<_> = self
            .blocked
            .iter()
            .filter(|e| e.value().is_active(now))
            .map(|e| e.value().clone())
            .collect();
        blocks.sort_by(|a, b| b.blocked_at.cmp(&a.blocked_at));
        blocks
    }

    // ------------------------------------------------------------------
    // Rate limiting
    // ------------------------------------------------------------------

    /// Sliding-window check for `(ip, endpoint)`; `true` means allowed
    pub fn check_rate_limit(&self, ip: &str, endpoint: &str, limit: u32, window: Duration) -> bool {
        self.check_rate_limit_detailed(ip, endpoint, &RateLimitConfig::new(limit, window))
            .allowed
    }

    pub fn check_rate_limit_detailed(
        &self,
        ip: &str,
        endpoint: &str,
        config: &RateLimitConfig,
    ) -> RateLimitResult {
        let now = self.clock.now_ms();

        let (result, newly_throttled) = {
            let mut entry = self
                .rate_limits
                .entry(RateKey {
                    ip: ip.to_string(),
                    endpoint: endpoint.to_string(),
                })
                .or_default();
            entry.window_ms = config.window_ms();
            let result = entry.log.try_acquire(now, config);
            let newly_throttled = !result.allowed && !entry.throttled;
            entry.throttled = !result.allowed;
            (result, newly_throttled)
        };

        if !result.allowed {
            tracing::debug!(ip = %ip, endpoint = %endpoint, "Rate limit denied");
        }
        if newly_throttled {
            self.alerts.record(
                NewAlert::new(AlertKind::RateLimitExceeded, Severity::Low, "Rate limit exceeded")
                    .with_ip(ip)
                    .with_context(serde_json::json!({
                        "endpoint": endpoint,
                        "limit": config.max_requests,
                        "windowMs": config.window_ms(),
                    })),
            );
        }
        result
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Evict expired failures and blocks, prune rate-limit histories
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now_ms();

        let failures_before = self.failures.len();
        self.failures.retain(|_, e| !e.is_expired(now));

        let mut expired_blocks = 0;
        self.blocked.retain(|ip, b| {
            let keep = b.is_active(now);
            if !keep {
                expired_blocks += 1;
                tracing::info!(ip = %ip, "IP block expired");
            }
            keep
        });

        let rate_before = self.rate_limits.len();
        self.rate_limits.retain(|_, e| {
            e.log.prune(now, e.window_ms);
            !e.log.is_empty()
        });

        SweepReport {
            expired_failures: failures_before.saturating_sub(self.failures.len()),
            expired_blocks,
            dropped_rate_limit_keys: rate_before.saturating_sub(self.rate_limits.len()),
        }
    }

    pub fn stats(&self) -> TrackerStats {
        let now = self.clock.now_ms();
        TrackerStats {
            blocked_ips: self.blocked.iter().filter(|e| e.value().is_active(now)).count(),
            failed_attempt_records: self
                .failures
                .iter()
                .filter(|e| !e.value().is_expired(now))
                .count(),
            rate_limit_keys: self.rate_limits.len(),
        }
    }
}

impl std::fmt::Debug for AbuseTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbuseTracker")
            .field("failures", &self.failures.len())
            .field("blocked", &self.blocked.len())
            .field("rate_limits", &self.rate_limits.len())
            .finish()
    }
}
