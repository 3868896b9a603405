//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Signing secrets and base64 decoding
//! - HS256 access tokens (issue + verify)
//! - Password hashing (Argon2id) and strength rules
//! - Client IP (trusted-proxy aware) / bearer token extraction
//! - Sliding-window rate limiting primitive

pub mod client;
pub mod crypto;
pub mod password;
pub mod rate_limit;
pub mod token;
