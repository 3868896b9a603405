//! In-memory credential store
//!
//! Argon2id hashes keyed by normalized identifier. Unknown identifiers
//! still pay for one hash verification so response time does not
//! reveal which accounts exist.

use std::collections::HashMap;
use std::sync::OnceLock;

use kernel::principal::Principal;
use parking_lot::RwLock;
use platform::password::{ClearTextPassword, HashedPassword};

use crate::application::abuse_tracker::normalize_identifier;
use crate::domain::repository::CredentialRepository;
use crate::error::SecurityResult;

struct StoredCredential {
    principal: Principal,
    hash: HashedPassword,
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    entries: RwLock<HashMap<String, StoredCredential>>,
    pepper: Option<Vec<u8>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pepper(pepper: impl Into<Vec<u8>>) -> Self {
        Self {
            entries: RwLock::default(),
            pepper: Some(pepper.into()),
        }
    }

    /// Add or replace a credential
    pub fn insert(
        &self,
        identifier: &str,
        password: &ClearTextPassword,
        principal: Principal,
    ) -> SecurityResult<()> {
        let hash = password.hash(self.pepper.as_deref())?;
        self.entries.write().insert(
            normalize_identifier(identifier),
            StoredCredential { principal, hash },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn dummy_hash() -> Option<&'static HashedPassword> {
    static DUMMY: OnceLock<Option<HashedPassword>> = OnceLock::new();
    DUMMY
        .get_or_init(|| {
            ClearTextPassword::new("timing-equalizer-password")
                .ok()
                .and_then(|p| p.hash(None).ok())
        })
        .as_ref()
}

impl CredentialRepository for InMemoryCredentialRepository {
    async fn verify(
        &self,
        identifier: &str,
        password: &ClearTextPassword,
    ) -> SecurityResult<Option<Principal>> {
        let key = normalize_identifier(identifier);
        let found = self
            .entries
            .read()
            .get(&key)
            .map(|c| (c.principal.clone(), c.hash.clone()));

        match found {
            Some((principal, hash)) => {
                if hash.verify(password, self.pepper.as_deref()) {
                    Ok(Some(principal))
                } else {
                    Ok(None)
                }
            }
            None => {
                if let Some(hash) = dummy_hash() {
                    let _ = hash.verify(password, self.pepper.as_deref());
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::principal::UserRole;

    fn password(raw: &str) -> ClearTextPassword {
        ClearTextPassword::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_verify_known_identifier() {
        let repo = InMemoryCredentialRepository::new();
        repo.insert("Admin@Example.com", &password("Sup3r#Secret"), Principal::new("admin-1", UserRole::Admin))
            .unwrap();

        let found = repo.verify("admin@example.com", &password("Sup3r#Secret")).await.unwrap();
        assert_eq!(found, Some(Principal::new("admin-1", UserRole::Admin)));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_alike() {
        let repo = InMemoryCredentialRepository::with_pepper(b"pepper".to_vec());
        repo.insert("a@example.com", &password("Sup3r#Secret"), Principal::new("u1", UserRole::User))
            .unwrap();

        let wrong = repo.verify("a@example.com", &password("nope-nope")).await.unwrap();
        let unknown = repo.verify("b@example.com", &password("Sup3r#Secret")).await.unwrap();
        assert_eq!(wrong, None);
        assert_eq!(unknown, None);
    }
}
