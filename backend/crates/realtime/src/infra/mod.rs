//! Infrastructure Layer

pub mod snapshot;

pub use snapshot::InMemorySnapshotSource;
