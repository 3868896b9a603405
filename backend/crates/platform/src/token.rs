//! Signed Access Tokens
//!
//! HS256 JWTs carrying the principal id, its role and an expiry.
//! Issued by the login endpoint, verified by the realtime gateway
//! and the admin middleware.
//!
//! `iat` and `exp` are Unix seconds. Expiry is checked against the
//! injected clock with no leeway, so the library's own wall-clock check
//! is switched off and `exp` is only required to be present.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use kernel::clock::{SharedClock, duration_ms};
use kernel::principal::{Principal, UserRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::random_secret;

/// Token failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    BadSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token carries an unknown role")]
    UnknownRole,

    #[error("Token could not be signed")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            JwtErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Claims carried inside a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal id
    pub sub: String,
    /// Role code
    pub role: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

/// A freshly issued token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at_ms: i64,
}

/// Resolves a bearer token to the principal it was issued for
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> Result<Principal, TokenError>;
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC signing secret (32 bytes)
    pub secret: [u8; 32],
    /// Token lifetime
    pub ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: [0u8; 32],
            ttl: Duration::from_secs(24 * 3600),
        }
    }
}

impl TokenConfig {
    /// Config with a random secret (tokens die with the process)
    pub fn development() -> Self {
        Self {
            secret: random_secret(),
            ..Default::default()
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        duration_ms(self.ttl)
    }
}

/// HS256 token issuer and verifier
#[derive(Clone)]
pub struct HmacTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Arc<Validation>,
    ttl_secs: i64,
    clock: SharedClock,
}

impl HmacTokenService {
    pub fn new(config: TokenConfig, clock: SharedClock) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation: Arc::new(validation),
            ttl_secs: config.ttl_ms() / 1000,
            clock,
        }
    }

    fn now_secs(&self) -> i64 {
        self.clock.now_ms().div_euclid(1000)
    }

    /// Issue a token for `principal`
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        let now = self.now_secs();
        let claims = TokenClaims {
            sub: principal.id.clone(),
            role: principal.role.code().to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at_ms: claims.exp.saturating_mul(1000),
        })
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|_| TokenError::Signing)
    }

    /// Verify signature and expiry, returning the claims
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?.claims;

        if self.now_secs() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl TokenVerifier for HmacTokenService {
    fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = self.decode(token)?;
        let role = UserRole::from_code(&claims.role).ok_or(TokenError::UnknownRole)?;
        if claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        Ok(Principal::new(claims.sub, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::clock::ManualClock;

    fn service(clock: Arc<ManualClock>) -> HmacTokenService {
        service_with_secret(clock, [9u8; 32])
    }

    fn service_with_secret(clock: Arc<ManualClock>, secret: [u8; 32]) -> HmacTokenService {
        let config = TokenConfig {
            secret,
            ttl: Duration::from_secs(60),
        };
        HmacTokenService::new(config, clock)
    }

    #[test]
    fn test_issue_then_verify() {
        let clock = Arc::new(ManualClock::new(1_000));
        let svc = service(clock);

        let issued = svc.issue(&Principal::new("user-1", UserRole::Admin)).unwrap();
        assert_eq!(issued.expires_at_ms, 61_000);
        assert_eq!(issued.token.split('.').count(), 3);

        let principal = svc.verify(&issued.token).unwrap();
        assert_eq!(principal.id, "user-1");
        assert_eq!(principal.role, UserRole::Admin);
    }

    #[test]
    fn test_expiry_follows_injected_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock.clone());
        let issued = svc.issue(&Principal::new("user-1", UserRole::User)).unwrap();

        clock.advance(Duration::from_millis(59_999));
        assert!(svc.verify(&issued.token).is_ok());

        clock.advance(Duration::from_millis(1));
        assert_eq!(svc.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_spliced_payload_is_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock.clone());
        let issued = svc.issue(&Principal::new("user-1", UserRole::User)).unwrap();

        // Admin claims signed elsewhere, carrying this service's signature
        let forged = service_with_secret(clock, [1u8; 32])
            .sign(&TokenClaims {
                sub: "user-1".into(),
                role: "admin".into(),
                iat: 0,
                exp: i64::MAX,
            })
            .unwrap();
        let (forged_body, _) = forged.rsplit_once('.').unwrap();
        let (_, signature) = issued.token.rsplit_once('.').unwrap();

        assert_eq!(
            svc.verify(&format!("{forged_body}.{signature}")),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let issued = service(clock.clone())
            .issue(&Principal::new("u", UserRole::User))
            .unwrap();

        let other = service_with_secret(clock, [1u8; 32]);
        assert_eq!(other.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock);

        for token in ["", "abc", "a.b", "a.b.c", "!!!.e30.sig"] {
            assert_eq!(svc.verify(token), Err(TokenError::Malformed), "token {token:?}");
        }
    }

    #[test]
    fn test_missing_exp_is_malformed() {
        #[derive(Serialize)]
        struct NoExpiry {
            sub: &'static str,
            role: &'static str,
        }

        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoExpiry { sub: "u", role: "user" },
            &EncodingKey::from_secret(&[9u8; 32]),
        )
        .unwrap();

        assert_eq!(svc.verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unknown_role() {
        let clock = Arc::new(ManualClock::new(0));
        let svc = service(clock);
        let token = svc
            .sign(&TokenClaims {
                sub: "u".into(),
                role: "root".into(),
                iat: 0,
                exp: 10,
            })
            .unwrap();
        assert_eq!(svc.verify(&token), Err(TokenError::UnknownRole));
    }

    #[test]
    fn test_library_errors_map_to_token_errors() {
        use jsonwebtoken::errors::Error;

        let map = |kind: JwtErrorKind| TokenError::from(Error::from(kind));
        assert_eq!(map(JwtErrorKind::ExpiredSignature), TokenError::Expired);
        assert_eq!(map(JwtErrorKind::InvalidSignature), TokenError::BadSignature);
        assert_eq!(map(JwtErrorKind::InvalidToken), TokenError::Malformed);
    }
}
