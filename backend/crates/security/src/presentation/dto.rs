//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::abuse_tracker::TrackerStats;
use crate::application::alert_log::AlertStats;
use crate::domain::entities::Severity;

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub role: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct PasswordStrengthRequest {
    pub password: String,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub severity: Option<Severity>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatsResponse {
    #[serde(flatten)]
    pub tracker: TrackerStats,
    pub alerts: AlertStats,
}

#[derive(Debug, Deserialize)]
pub struct BlockIpRequest {
    pub ip: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnblockIpRequest {
    pub ip: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnblockIpResponse {
    pub unblocked: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearFailedAttemptsRequest {
    pub ip: Option<String>,
    pub identifier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}
