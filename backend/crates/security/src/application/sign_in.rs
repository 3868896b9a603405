//! Sign In Use Case
//!
//! Credential check wrapped in the abuse-mitigation rules:
//! blocked IPs are refused outright, logins are rate limited per IP,
//! failures feed the tracker and success forgives them.

use std::sync::Arc;

use kernel::principal::Principal;
use platform::password::ClearTextPassword;
use platform::token::{HmacTokenService, IssuedToken};

use crate::application::abuse_tracker::AbuseTracker;
use crate::domain::repository::CredentialRepository;
use crate::error::{SecurityError, SecurityResult};

/// Rate-limit bucket name for login attempts
pub const LOGIN_ENDPOINT: &str = "login";

/// Sign in input
pub struct SignInInput {
    /// Client IP key
    pub ip: String,
    /// Email or user name
    pub identifier: String,
    pub password: String,
}

/// Sign in output
#[derive(Debug, Clone)]
pub struct SignInOutput {
    pub principal: Principal,
    pub token: IssuedToken,
}

/// Sign in use case
pub struct SignInUseCase<C>
where
    C: CredentialRepository,
{
    credentials: Arc<C>,
    tracker: Arc<AbuseTracker>,
    tokens: Arc<HmacTokenService>,
}

impl<C> SignInUseCase<C>
where
    C: CredentialRepository,
{
    pub fn new(credentials: Arc<C>, tracker: Arc<AbuseTracker>, tokens: Arc<HmacTokenService>) -> Self {
        Self {
            credentials,
            tracker,
            tokens,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> SecurityResult<SignInOutput> {
        let ip = input.ip.as_str();

        // Blocked IPs never reach the credential store
        if self.tracker.is_blocked(ip) {
            return Err(SecurityError::AccessDenied);
        }

        let limit = self.tracker.check_rate_limit_detailed(
            ip,
            LOGIN_ENDPOINT,
            &self.tracker.config().login_rate_limit,
        );
        if !limit.allowed {
            return Err(SecurityError::RateLimited {
                retry_after: limit.retry_after(self.tracker.now_ms()),
            });
        }

        let principal = match ClearTextPassword::new(input.password) {
            Ok(password) => self.credentials.verify(&input.identifier, &password).await?,
            Err(_) => None,
        };

        let Some(principal) = principal else {
            let outcome = self.tracker.record_failed_attempt(ip, &input.identifier);
            tracing::debug!(ip = %ip, count = outcome.count, blocked = outcome.ip_blocked, "Sign-in rejected");
            return Err(SecurityError::InvalidCredentials);
        };

        self.tracker.record_success(ip, &input.identifier);
        let token = self
            .tokens
            .issue(&principal)
            .map_err(|e| SecurityError::Internal(e.to_string()))?;

        tracing::info!(ip = %ip, principal_id = %principal.id, role = %principal.role, "Sign-in succeeded");

        Ok(SignInOutput { principal, token })
    }
}
