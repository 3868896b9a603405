//! HTTP Handlers

use std::net::IpAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use platform::client::ClientIp;
use platform::password::{PasswordStrength, check_strength};
use platform::token::{HmacTokenService, TokenVerifier};

use crate::application::abuse_tracker::AbuseTracker;
use crate::application::alert_log::{AlertFilter, AlertLog};
use crate::application::suspicious::SuspiciousInputScanner;
use crate::application::{SignInInput, SignInUseCase};
use crate::domain::entities::{AlertKind, BlockedIp, FailedAttemptRecord, SecurityAlert};
use crate::domain::repository::CredentialRepository;
use crate::error::{SecurityError, SecurityResult};
use crate::presentation::dto::{
    AlertsQuery, BlockIpRequest, ClearFailedAttemptsRequest, ClearedResponse, LimitQuery,
    LoginRequest, LoginResponse, PasswordStrengthRequest, SecurityStatsResponse,
    UnblockIpRequest, UnblockIpResponse,
};

/// Shared state for security handlers and middleware
#[derive(Clone)]
pub struct SecurityAppState {
    pub tracker: Arc<AbuseTracker>,
    pub alerts: Arc<AlertLog>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub scanner: SuspiciousInputScanner,
}

impl SecurityAppState {
    pub fn new(tracker: Arc<AbuseTracker>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            alerts: tracker.alerts().clone(),
            tracker,
            verifier,
            scanner: SuspiciousInputScanner::new(),
        }
    }
}

/// Shared state for the login handler
pub struct AuthAppState<C>
where
    C: CredentialRepository + Send + Sync + 'static,
{
    pub credentials: Arc<C>,
    pub tracker: Arc<AbuseTracker>,
    pub tokens: Arc<HmacTokenService>,
}

impl<C> Clone for AuthAppState<C>
where
    C: CredentialRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            credentials: self.credentials.clone(),
            tracker: self.tracker.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

// ============================================================================
// Public
// ============================================================================

/// POST /api/auth/login
pub async fn login<C>(
    State(state): State<AuthAppState<C>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> SecurityResult<Json<LoginResponse>>
where
    C: CredentialRepository + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(
        state.credentials.clone(),
        state.tracker.clone(),
        state.tokens.clone(),
    );

    let output = use_case
        .execute(SignInInput {
            ip,
            identifier: req.email,
            password: req.password,
        })
        .await?;

    Ok(Json(LoginResponse {
        token: output.token.token,
        user_id: output.principal.id,
        role: output.principal.role.code().to_string(),
        expires_at_ms: output.token.expires_at_ms,
    }))
}

/// POST /api/security/password-strength
pub async fn password_strength(Json(req): Json<PasswordStrengthRequest>) -> Json<PasswordStrength> {
    Json(check_strength(&req.password))
}

// ============================================================================
// Admin reads
// ============================================================================

/// GET /api/security/stats
pub async fn stats(State(state): State<SecurityAppState>) -> Json<SecurityStatsResponse> {
    Json(SecurityStatsResponse {
        tracker: state.tracker.stats(),
        alerts: state.alerts.stats(),
    })
}

/// GET /api/security/alerts?severity=&limit=
pub async fn alerts(
    State(state): State<SecurityAppState>,
    Query(query): Query<AlertsQuery>,
) -> Json<Vec<SecurityAlert>> {
    let filter = AlertFilter {
        severity: query.severity,
        kind: None,
        limit: query.limit,
    };
    Json(state.alerts.query(&filter))
}

/// GET /api/security/suspicious?limit=
pub async fn suspicious(
    State(state): State<SecurityAppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<SecurityAlert>> {
    let filter = AlertFilter {
        kind: Some(AlertKind::SuspiciousActivity),
        limit: query.limit,
        ..Default::default()
    };
    Json(state.alerts.query(&filter))
}

/// GET /api/security/blocked-ips
pub async fn blocked_ips(State(state): State<SecurityAppState>) -> Json<Vec<BlockedIp>> {
    Json(state.tracker.blocked_ips())
}

/// GET /api/security/failed-attempts
pub async fn failed_attempts(
    State(state): State<SecurityAppState>,
) -> Json<Vec<FailedAttemptRecord>> {
    Json(state.tracker.failed_attempts())
}

// ============================================================================
// Admin writes
// ============================================================================

fn parse_ip(raw: &str) -> SecurityResult<String> {
    raw.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| SecurityError::InvalidInput("ip must be an IPv4 or IPv6 address".to_string()))
}

/// POST /api/security/block
pub async fn block_ip(
    State(state): State<SecurityAppState>,
    Json(req): Json<BlockIpRequest>,
) -> SecurityResult<Json<BlockedIp>> {
    let ip = parse_ip(&req.ip)?;
    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Manually blocked by administrator".to_string());
    Ok(Json(state.tracker.block_ip(&ip, &reason)))
}

/// POST /api/security/unblock
pub async fn unblock_ip(
    State(state): State<SecurityAppState>,
    Json(req): Json<UnblockIpRequest>,
) -> SecurityResult<Json<UnblockIpResponse>> {
    let ip = parse_ip(&req.ip)?;
    Ok(Json(UnblockIpResponse {
        unblocked: state.tracker.unblock_ip(&ip),
    }))
}

/// POST /api/security/failed-attempts/clear
pub async fn clear_failed_attempts(
    State(state): State<SecurityAppState>,
    Json(req): Json<ClearFailedAttemptsRequest>,
) -> SecurityResult<Json<ClearedResponse>> {
    let ip = req.ip.as_deref().map(parse_ip).transpose()?;
    let cleared = state
        .tracker
        .clear_failed_attempts(ip.as_deref(), req.identifier.as_deref());
    Ok(Json(ClearedResponse { cleared }))
}
