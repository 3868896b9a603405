//! Realtime (WebSocket Gateway) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Connection handle, lifecycle phase, message envelopes, snapshot source
//! - `application/` - Connection registry, broadcaster, message router, built-in handlers
//! - `infra/` - In-memory snapshot source
//! - `presentation/` - WebSocket upgrade, per-connection session, routers
//!
//! ## Connection Model
//! - One authenticated connection per principal; a reconnect replaces the old entry
//! - Role groups ("rooms") mirror the registered connections
//! - Outbound frames go through a bounded per-connection queue drained by a writer
//! - Broadcasts are best effort over a membership snapshot

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

pub use application::broadcaster::Broadcaster;
pub use application::config::RealtimeConfig;
pub use application::registry::ConnectionRegistry;
pub use application::router::{DispatchOutcome, HandlerContext, MessageHandler, MessageRouter, Services};
pub use domain::connection::{Connection, ConnectionHandle, Frame};
pub use domain::message::{InboundMessage, OutboundMessage};
pub use domain::snapshot::SnapshotSource;
pub use error::{GatewayError, RouterError};
pub use infra::snapshot::InMemorySnapshotSource;
pub use presentation::gateway::{GatewayState, InboundFrame, run_session};
pub use presentation::router::{realtime_api_router, realtime_router};
