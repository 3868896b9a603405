//! Security (Abuse Mitigation) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Alerts, failure records, blocked IPs, collaborator traits
//! - `application/` - Abuse tracker, alert log, sweeper, guarded sign-in, input scanner
//! - `infra/` - In-memory credential store, alert notifier
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Security Model
//! - Five failed logins for one `(ip, identifier)` inside 15 minutes block the IP for an hour
//! - Blocked IPs are rejected before credentials or tokens are looked at
//! - Per `(ip, endpoint)` sliding-window rate limits
//! - Every block, threshold breach and suspicious input lands in a bounded alert log
//! - Denials never reveal which rule fired

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::abuse_tracker::AbuseTracker;
pub use application::alert_log::{AlertFilter, AlertLog};
pub use application::config::SecurityConfig;
pub use application::sweeper::spawn_sweeper;
pub use domain::entities::{AlertKind, NewAlert, SecurityAlert, Severity};
pub use error::{SecurityError, SecurityResult};
pub use infra::memory::InMemoryCredentialRepository;
pub use infra::notifier::TracingAlertNotifier;
pub use presentation::router::{auth_router, guard_api, security_router};
pub use presentation::handlers::SecurityAppState;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entities::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

#[cfg(test)]
mod tests;
