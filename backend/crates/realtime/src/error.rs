//! Realtime Error Types

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::token::TokenError;
use thiserror::Error;

/// Handshake rejection
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Client IP is blocked
    #[error("Access denied")]
    Blocked,

    /// Too many connection attempts from this IP
    #[error("Too many connection attempts")]
    RateLimited { retry_after: Duration },

    /// No token in the query string or `Authorization` header
    #[error("Authentication required")]
    MissingToken,

    /// Token failed signature, expiry or role checks
    #[error("Authentication required")]
    InvalidToken(#[source] TokenError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Blocked => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::MissingToken | GatewayError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Blocked => ErrorKind::Forbidden,
            GatewayError::RateLimited { .. } => ErrorKind::TooManyRequests,
            GatewayError::MissingToken | GatewayError::InvalidToken(_) => ErrorKind::Unauthorized,
        }
    }

    /// Short reason for logs and alerts
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::Blocked => "blocked_ip",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::MissingToken => "missing_token",
            GatewayError::InvalidToken(TokenError::Expired) => "expired_token",
            GatewayError::InvalidToken(_) => "invalid_token",
        }
    }

    fn log(&self) {
        match self {
            GatewayError::Blocked | GatewayError::RateLimited { .. } => {
                tracing::warn!(reason = self.reason(), "WebSocket handshake refused");
            }
            _ => {
                tracing::debug!(reason = self.reason(), "WebSocket handshake unauthenticated");
            }
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let app = AppError::new(err.kind(), err.to_string());
        match err {
            GatewayError::RateLimited { retry_after } => app.with_retry_after(retry_after),
            _ => app,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

/// Per-message dispatch failure; never closes the connection
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid payload for {kind}: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Handler panicked")]
    HandlerPanicked,
}

impl RouterError {
    /// Faults are server-side problems worth an alert
    pub fn is_fault(&self) -> bool {
        matches!(self, RouterError::HandlerFailed(_) | RouterError::HandlerPanicked)
    }
}
