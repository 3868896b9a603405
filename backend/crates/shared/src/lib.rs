//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the "smallest core" of vocabulary shared by the
//! security and realtime layers:
//! - Common error types and result aliases
//! - Typed ID wrappers
//! - The authenticated principal and its role
//! - A clock abstraction so expiry logic can be driven deterministically
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all domains.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod clock;
pub mod id;
pub mod principal;
