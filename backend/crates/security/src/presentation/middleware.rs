//! Security Middleware
//!
//! Request guards applied in front of the API routes:
//! blocked-IP rejection, per-(ip, path) rate limiting, suspicious-input
//! scanning and the admin-role gate.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::principal::Principal;
use platform::client::{extract_bearer_token, request_ip_key};

use crate::domain::entities::{AlertKind, NewAlert, Severity};
use crate::error::SecurityError;
use crate::presentation::handlers::SecurityAppState;

fn request_ip(req: &Request) -> String {
    request_ip_key(req.headers(), req.extensions())
}

/// Reject every request from a blocked IP with a generic 403
pub async fn deny_blocked_ips(
    State(state): State<SecurityAppState>,
    req: Request,
    next: Next,
) -> Response {
    let ip = request_ip(&req);
    if state.tracker.is_blocked(&ip) {
        tracing::warn!(ip = %ip, path = %req.uri().path(), "Blocked IP rejected");
        return SecurityError::AccessDenied.into_response();
    }
    next.run(req).await
}

/// Generic sliding-window limit per `(ip, path)`
pub async fn rate_limit_requests(
    State(state): State<SecurityAppState>,
    req: Request,
    next: Next,
) -> Response {
    let ip = request_ip(&req);
    let result = state.tracker.check_rate_limit_detailed(
        &ip,
        req.uri().path(),
        &state.tracker.config().api_rate_limit,
    );
    if !result.allowed {
        return SecurityError::RateLimited {
            retry_after: result.retry_after(state.tracker.now_ms()),
        }
        .into_response();
    }
    next.run(req).await
}

/// Reject requests whose path, query or body matches an attack signature
pub async fn scan_suspicious_input(
    State(state): State<SecurityAppState>,
    req: Request,
    next: Next,
) -> Response {
    let ip = request_ip(&req);
    let path = req.uri().path().to_string();
    let max_body = state.tracker.config().max_scanned_body_bytes;

    let declared_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > max_body) {
        return SecurityError::PayloadTooLarge.into_response();
    }

    let mut category = state.scanner.scan(&path);
    if category.is_none() {
        category = req.uri().query().and_then(|q| state.scanner.scan(q));
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, max_body).await {
        Ok(bytes) => bytes,
        Err(_) => return SecurityError::PayloadTooLarge.into_response(),
    };
    if category.is_none() {
        category = state.scanner.scan_body(&bytes);
    }

    if let Some(category) = category {
        state.alerts.record(
            NewAlert::new(
                AlertKind::SuspiciousActivity,
                Severity::Medium,
                format!("Suspicious input detected: {category}"),
            )
            .with_ip(ip.clone())
            .with_context(serde_json::json!({
                "path": path,
                "method": parts.method.as_str(),
                "category": category.as_str(),
            })),
        );
        tracing::warn!(ip = %ip, path = %path, category = %category, "Suspicious input rejected");
        return SecurityError::SuspiciousInput.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Require a bearer token for an admin-or-higher principal.
/// The verified [`Principal`] is stored in request extensions.
pub async fn require_admin(
    State(state): State<SecurityAppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(req.headers()) else {
        return SecurityError::Unauthorized.into_response();
    };

    let principal = match state.verifier.verify(&token) {
        Ok(principal) => principal,
        Err(e) => {
            tracing::debug!(error = %e, "Bearer token rejected");
            return SecurityError::Unauthorized.into_response();
        }
    };

    if !principal.is_admin() {
        let ip = request_ip(&req);
        state.alerts.record(
            NewAlert::new(
                AlertKind::UnauthorizedAccess,
                Severity::Medium,
                "Non-admin principal attempted an admin endpoint",
            )
            .with_ip(ip)
            .with_identifier(principal.id.clone())
            .with_context(serde_json::json!({
                "path": req.uri().path(),
                "role": principal.role.code(),
            })),
        );
        return SecurityError::Forbidden.into_response();
    }

    req.extensions_mut().insert::<Principal>(principal);
    next.run(req).await
}
