//! Password Hashing and Strength Rules
//!
//! - Argon2id hashing for stored credentials
//! - Zeroization of clear text on drop
//! - The strength rules exposed by the password-strength endpoint
//!
//! Strength rules (each unmet rule yields one feedback line):
//! length >= 8, an uppercase letter, a lowercase letter, a digit,
//! a special character.

use std::fmt;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;
use serde::Serialize;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum password length for the strength check
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest input the hasher accepts; longer input is treated as invalid
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password cannot be empty")]
    Empty,

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Strength check
// ============================================================================

/// Result of the strength check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    pub is_strong: bool,
    /// Number of satisfied rules (0..=5)
    pub score: u8,
    /// One line per unmet rule
    pub feedback: Vec<String>,
}

/// Evaluate `password` against the strength rules
///
/// ## Examples
/// ```rust
/// use platform::password::check_strength;
///
/// let weak = check_strength("abc");
/// assert!(!weak.is_strong);
/// assert_eq!(weak.feedback.len(), 4);
///
/// assert!(check_strength("Str0ng!Pass").is_strong);
/// ```
pub fn check_strength(password: &str) -> PasswordStrength {
    let normalized: String = password.nfkc().collect();
    let mut feedback = Vec::new();

    if normalized.chars().count() < MIN_PASSWORD_LENGTH {
        feedback.push(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !normalized.chars().any(char::is_uppercase) {
        feedback.push("Password must contain at least one uppercase letter".to_string());
    }
    if !normalized.chars().any(char::is_lowercase) {
        feedback.push("Password must contain at least one lowercase letter".to_string());
    }
    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        feedback.push("Password must contain at least one number".to_string());
    }
    if !normalized.chars().any(is_special) {
        feedback.push("Password must contain at least one special character".to_string());
    }

    const RULES: u8 = 5;
    let score = RULES - feedback.len() as u8;

    PasswordStrength {
        is_strong: feedback.is_empty(),
        score,
        feedback,
    }
}

fn is_special(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Construction only normalizes (NFKC) and bounds the input; the strength
/// rules are advisory and never block a login attempt.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    pub fn new(raw: impl Into<String>) -> Result<Self, PasswordPolicyError> {
        let mut raw = raw.into();
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();

        if normalized.is_empty() {
            return Err(PasswordPolicyError::Empty);
        }

        let char_count = normalized.chars().count();
        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        Ok(Self(normalized))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Hash the password using Argon2id, returning a PHC string
    pub fn hash(&self, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        let password_bytes = peppered(self, pepper);
        let salt = SaltString::generate(OsRng);

        let hash = Argon2::default()
            .hash_password(&password_bytes, &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

fn peppered(password: &ClearTextPassword, pepper: Option<&[u8]>) -> Vec<u8> {
    let mut bytes = password.as_bytes().to_vec();
    if let Some(p) = pepper {
        bytes.extend_from_slice(p);
    }
    bytes
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Argon2id hash in PHC string format
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash (constant-time inside argon2)
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let parsed_hash = match PasswordHash::new(&self.hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(&peppered(password, pepper), &parsed_hash)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}
