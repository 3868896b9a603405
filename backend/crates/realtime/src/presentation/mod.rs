//! Presentation Layer
//!
//! WebSocket upgrade, per-connection session and HTTP routers.

pub mod gateway;
pub mod router;

pub use gateway::{GatewayState, InboundFrame, run_session};
