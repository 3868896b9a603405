//! Presentation Layer
//!
//! HTTP handlers, DTOs, middleware and routers.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, SecurityAppState};
