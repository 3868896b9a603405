//! Application Layer
//!
//! Stateful services and use cases.

pub mod abuse_tracker;
pub mod alert_log;
pub mod config;
pub mod sign_in;
pub mod suspicious;
pub mod sweeper;

pub use abuse_tracker::AbuseTracker;
pub use alert_log::{AlertFilter, AlertLog, AlertStats};
pub use config::SecurityConfig;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use suspicious::{SuspiciousInputScanner, ThreatCategory};
pub use sweeper::spawn_sweeper;
