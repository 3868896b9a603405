//! Security Alert Log
//!
//! Bounded, append-only, newest-first record of security events.
//! High-severity alerts are forwarded to an [`AlertNotifier`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use kernel::clock::{SharedClock, duration_ms};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{AlertKind, NewAlert, SecurityAlert, Severity};
use crate::domain::repository::AlertNotifier;

/// Default result count for [`AlertLog::query`]
pub const DEFAULT_QUERY_LIMIT: usize = 50;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Query filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub kind: Option<AlertKind>,
    pub limit: Option<usize>,
}

impl AlertFilter {
    pub fn severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ..Default::default()
        }
    }

    pub fn kind(kind: AlertKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, alert: &SecurityAlert) -> bool {
        self.severity.is_none_or(|s| alert.severity == s) && self.kind.is_none_or(|k| alert.kind == k)
    }
}

/// Summary counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub last_24h: usize,
}

pub struct AlertLog {
    entries: Mutex<VecDeque<SecurityAlert>>,
    capacity: usize,
    clock: SharedClock,
    notifier: Arc<dyn AlertNotifier>,
}

impl AlertLog {
    pub fn new(capacity: usize, clock: SharedClock, notifier: Arc<dyn AlertNotifier>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            clock,
            notifier,
        }
    }

    /// Stamp, append, evict past capacity, notify if high
    pub fn record(&self, alert: NewAlert) -> SecurityAlert {
        let alert = SecurityAlert::from_new(alert, self.clock.now_ms());

        {
            let mut entries = self.entries.lock();
            entries.push_back(alert.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }

        tracing::info!(
            alert_id = %alert.id,
            kind = %alert.kind,
            severity = %alert.severity,
            ip = alert.ip.as_deref().unwrap_or("-"),
            "{}",
            alert.message
        );

        if alert.severity == Severity::High {
            self.notifier.notify(&alert);
        }

        alert
    }

    /// Newest first
    pub fn query(&self, filter: &AlertFilter) -> Vec<SecurityAlert> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .min(self.capacity);

        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Purge entries older than `max_age`; returns how many were removed
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = self.clock.now_ms().saturating_sub(duration_ms(max_age));
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|a| a.timestamp >= cutoff);
        before - entries.len()
    }

    pub fn stats(&self) -> AlertStats {
        let day_ago = self.clock.now_ms().saturating_sub(duration_ms(DAY));
        let entries = self.entries.lock();

        let mut stats = AlertStats {
            total: entries.len(),
            ..Default::default()
        };
        for alert in entries.iter() {
            match alert.severity {
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
                Severity::Low => stats.low += 1,
            }
            if alert.timestamp >= day_ago {
                stats.last_24h += 1;
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for AlertLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
