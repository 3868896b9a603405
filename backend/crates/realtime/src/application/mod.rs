//! Application Layer

pub mod broadcaster;
pub mod config;
pub mod handlers;
pub mod registry;
pub mod router;

pub use broadcaster::Broadcaster;
pub use config::RealtimeConfig;
pub use registry::ConnectionRegistry;
pub use router::{DispatchOutcome, HandlerContext, MessageHandler, MessageRouter, Services};
