//! Security Router

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use platform::token::HmacTokenService;

use crate::application::abuse_tracker::AbuseTracker;
use crate::domain::repository::CredentialRepository;
use crate::presentation::handlers::{self, AuthAppState, SecurityAppState};
use crate::presentation::middleware::{
    deny_blocked_ips, rate_limit_requests, require_admin, scan_suspicious_input,
};

/// Routes mounted under `/api/auth`
pub fn auth_router<C>(
    credentials: Arc<C>,
    tracker: Arc<AbuseTracker>,
    tokens: Arc<HmacTokenService>,
) -> Router
where
    C: CredentialRepository + Send + Sync + 'static,
{
    let state = AuthAppState {
        credentials,
        tracker,
        tokens,
    };

    Router::new()
        .route("/login", post(handlers::login::<C>))
        .with_state(state)
}

/// Routes mounted under `/api/security`
pub fn security_router(state: SecurityAppState) -> Router {
    let admin = Router::new()
        .route("/stats", get(handlers::stats))
        .route("/alerts", get(handlers::alerts))
        .route("/suspicious", get(handlers::suspicious))
        .route("/blocked-ips", get(handlers::blocked_ips))
        .route("/failed-attempts", get(handlers::failed_attempts))
        .route("/failed-attempts/clear", post(handlers::clear_failed_attempts))
        .route("/block", post(handlers::block_ip))
        .route("/unblock", post(handlers::unblock_ip))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/password-strength", post(handlers::password_strength))
        .merge(admin)
        .with_state(state)
}

/// Wrap API routes in the request guards.
/// Order on the way in: blocked-IP check, rate limit, input scan.
pub fn guard_api(router: Router, state: SecurityAppState) -> Router {
    router
        .layer(from_fn_with_state(state.clone(), scan_suspicious_input))
        .layer(from_fn_with_state(state.clone(), rate_limit_requests))
        .layer(from_fn_with_state(state, deny_blocked_ips))
}
