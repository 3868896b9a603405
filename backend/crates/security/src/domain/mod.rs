//! Domain Layer
//!
//! Security records and the collaborator interfaces this layer consumes.

pub mod entities;
pub mod repository;

pub use entities::*;
pub use repository::{AlertNotifier, CredentialRepository};
