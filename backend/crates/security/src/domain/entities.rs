//! Domain Entities
//!
//! Security alerts, failed-attempt records and blocked IPs.

use kernel::id::AlertId;
use serde::{Deserialize, Serialize};

/// Alert severity, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Failure threshold reached for an `(ip, identifier)` pair
    RepeatedFailedLogins,
    IpBlocked,
    IpUnblocked,
    RateLimitExceeded,
    /// Input matched an attack signature
    SuspiciousActivity,
    /// Authenticated principal hit an endpoint above its role
    UnauthorizedAccess,
    /// Realtime handshake refused
    ConnectionRejected,
    /// A realtime message handler failed or panicked
    HandlerFault,
}

impl AlertKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AlertKind::RepeatedFailedLogins => "repeated_failed_logins",
            AlertKind::IpBlocked => "ip_blocked",
            AlertKind::IpUnblocked => "ip_unblocked",
            AlertKind::RateLimitExceeded => "rate_limit_exceeded",
            AlertKind::SuspiciousActivity => "suspicious_activity",
            AlertKind::UnauthorizedAccess => "unauthorized_access",
            AlertKind::ConnectionRejected => "connection_rejected",
            AlertKind::HandlerFault => "handler_fault",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert before the log assigns its id and timestamp
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub ip: Option<String>,
    pub identifier: Option<String>,
    pub context: serde_json::Value,
}

impl NewAlert {
    pub fn new(kind: AlertKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            ip: None,
            identifier: None,
            context: serde_json::Value::Null,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Immutable record in the alert log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub id: AlertId,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
}

impl SecurityAlert {
    pub fn from_new(alert: NewAlert, timestamp: i64) -> Self {
        Self {
            id: AlertId::new(),
            timestamp,
            kind: alert.kind,
            severity: alert.severity,
            message: alert.message,
            ip: alert.ip,
            identifier: alert.identifier,
            context: alert.context,
        }
    }
}

/// Row of the failed-login table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttemptRecord {
    pub ip: String,
    pub identifier: String,
    pub count: u32,
    pub first_attempt_at: i64,
    pub last_attempt_at: i64,
    pub expires_at: i64,
}

/// A blocked client address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedIp {
    pub ip: String,
    pub reason: String,
    pub blocked_at: i64,
    pub expires_at: i64,
}

impl BlockedIp {
    #[inline]
    pub fn is_active(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }
}
