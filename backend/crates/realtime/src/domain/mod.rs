//! Domain Layer

pub mod connection;
pub mod message;
pub mod snapshot;

pub use connection::{Connection, ConnectionHandle, ConnectionPhase, Frame, Lifecycle};
pub use message::{InboundMessage, OutboundMessage};
pub use snapshot::SnapshotSource;
