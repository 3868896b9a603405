//! Security Error Types
//!
//! Security-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Security-specific result type alias
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Security-specific error variants
///
/// Messages are deliberately generic: a client learns that it was denied,
/// never which rule denied it.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Client IP is on the blocked list
    #[error("Access denied")]
    AccessDenied,

    /// Sliding-window limit exhausted
    #[error("Too many requests")]
    RateLimited { retry_after: Duration },

    /// Unknown identifier or wrong password (indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed or expired bearer token
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated, but role is insufficient
    #[error("Insufficient permissions")]
    Forbidden,

    /// Request body or parameters rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input matched an attack signature
    #[error("Request rejected")]
    SuspiciousInput,

    /// Request body over the scanner limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SecurityError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            SecurityError::AccessDenied | SecurityError::Forbidden => StatusCode::FORBIDDEN,
            SecurityError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SecurityError::InvalidCredentials | SecurityError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            SecurityError::InvalidInput(_) | SecurityError::SuspiciousInput => {
                StatusCode::BAD_REQUEST
            }
            SecurityError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            SecurityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecurityError::AccessDenied | SecurityError::Forbidden => ErrorKind::Forbidden,
            SecurityError::RateLimited { .. } => ErrorKind::TooManyRequests,
            SecurityError::InvalidCredentials | SecurityError::Unauthorized => {
                ErrorKind::Unauthorized
            }
            SecurityError::InvalidInput(_) | SecurityError::SuspiciousInput => {
                ErrorKind::BadRequest
            }
            SecurityError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            SecurityError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            SecurityError::Internal(msg) => {
                tracing::error!(message = %msg, "Security internal error");
            }
            SecurityError::AccessDenied => {
                tracing::warn!("Request from blocked IP denied");
            }
            SecurityError::RateLimited { retry_after } => {
                tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
            }
            SecurityError::SuspiciousInput => {
                tracing::warn!("Suspicious request rejected");
            }
            _ => {
                tracing::debug!(error = %self, "Security error");
            }
        }
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        let app = AppError::new(err.kind(), err.to_string());
        match err {
            SecurityError::RateLimited { retry_after } => app.with_retry_after(retry_after),
            SecurityError::Unauthorized => app.with_action("Sign in and retry with a bearer token"),
            _ => app,
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

impl From<platform::token::TokenError> for SecurityError {
    fn from(_: platform::token::TokenError) -> Self {
        SecurityError::Unauthorized
    }
}

impl From<platform::password::PasswordHashError> for SecurityError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        SecurityError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denials_map_to_expected_status() {
        assert_eq!(SecurityError::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            SecurityError::RateLimited { retry_after: Duration::from_secs(3) }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            SecurityError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(SecurityError::SuspiciousInput.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_messages_do_not_leak_rules() {
        assert_eq!(SecurityError::AccessDenied.to_string(), "Access denied");
        assert_eq!(SecurityError::InvalidCredentials.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let app: AppError = SecurityError::RateLimited {
            retry_after: Duration::from_millis(2500),
        }
        .into();
        assert_eq!(app.kind(), ErrorKind::TooManyRequests);
        assert_eq!(app.retry_after_secs(), Some(3));
    }
}
