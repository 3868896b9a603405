//! Collaborator Traits
//!
//! Interfaces implemented outside this layer: credential lookup for the
//! login endpoint and the out-of-band notification hook for high alerts.

use kernel::principal::Principal;
use platform::password::ClearTextPassword;

use crate::domain::entities::SecurityAlert;
use crate::error::SecurityResult;

/// Credential lookup used by the guarded sign-in
#[trait_variant::make(CredentialRepository: Send)]
pub trait LocalCredentialRepository {
    /// Resolve `identifier` + `password` to a principal.
    /// Returns `Ok(None)` for unknown identifiers and wrong passwords alike.
    async fn verify(
        &self,
        identifier: &str,
        password: &ClearTextPassword,
    ) -> SecurityResult<Option<Principal>>;
}

/// Out-of-band delivery for high-severity alerts (email, SMS, pager...)
///
/// Called synchronously from `AlertLog::record`; implementations must not
/// block and should hand off to their own task if delivery is slow.
pub trait AlertNotifier: Send + Sync + 'static {
    fn notify(&self, alert: &SecurityAlert);
}
