//! Infrastructure Layer

pub mod memory;
pub mod notifier;

pub use memory::InMemoryCredentialRepository;
pub use notifier::TracingAlertNotifier;
