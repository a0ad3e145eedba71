//! Identity directory: the seam between lifecycle logic and the login system.
//!
//! Provisioning and deprovisioning never touch tokens or hashes directly;
//! they go through this trait so the login backend can be swapped without
//! touching the services.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::credentials::CredentialService;
use crate::auth::jwt::JwtConfig;
use crate::models::{Identity, NewIdentity};
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("account not found or inactive")]
    UnknownAccount,
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("credential processing failed: {0}")]
    Credential(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The authenticated caller, as resolved from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthActor {
    pub id: Uuid,
    pub email: String,
}

pub trait IdentityDirectory: Send + Sync {
    /// Creates a login account, storing only the credential hash.
    fn create_account(
        &self,
        email: &str,
        display_name: &str,
        credential: &str,
    ) -> Result<Identity, DirectoryError>;

    /// Removes the login account. Returns whether a row was deleted.
    fn delete_account(&self, identity_id: Uuid) -> Result<bool, DirectoryError>;

    /// Resolves a bearer token to a live account.
    fn verify_token(&self, token: &str) -> Result<AuthActor, DirectoryError>;
}

/// Production directory: Ed25519 JWT verification backed by Argon2
/// credential rows in `identities`.
#[derive(Clone)]
pub struct JwtDirectory {
    store: Arc<dyn RecordStore>,
    jwt: JwtConfig,
    hash_cost: u32,
}

impl JwtDirectory {
    pub fn new(store: Arc<dyn RecordStore>, jwt: JwtConfig, hash_cost: u32) -> Self {
        Self {
            store,
            jwt,
            hash_cost,
        }
    }
}

impl IdentityDirectory for JwtDirectory {
    fn create_account(
        &self,
        email: &str,
        display_name: &str,
        credential: &str,
    ) -> Result<Identity, DirectoryError> {
        let credential_hash = CredentialService::hash_with_cost(credential, self.hash_cost)
            .map_err(|e| DirectoryError::Credential(e.to_string()))?;

        self.store
            .insert_identity(NewIdentity {
                email: email.to_string(),
                display_name: display_name.to_string(),
                credential_hash,
            })
            .map_err(|e| match e {
                StoreError::Constraint(_) => DirectoryError::DuplicateEmail,
                other => DirectoryError::Store(other),
            })
    }

    fn delete_account(&self, identity_id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.store.delete_identity(identity_id)? > 0)
    }

    fn verify_token(&self, token: &str) -> Result<AuthActor, DirectoryError> {
        let claims = self
            .jwt
            .verify_access_token(token)
            .map_err(|_| DirectoryError::InvalidToken)?;

        let id = Uuid::parse_str(&claims.sub).map_err(|_| DirectoryError::InvalidToken)?;

        let identity = self
            .store
            .find_identity(id)?
            .filter(|i| i.is_active)
            .ok_or(DirectoryError::UnknownAccount)?;

        Ok(AuthActor {
            id: identity.id,
            email: identity.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use jwt_simple::algorithms::Ed25519KeyPair;

    fn directory(store: Arc<MemoryStore>) -> JwtDirectory {
        let jwt = JwtConfig::from_key_pair(Ed25519KeyPair::generate());
        JwtDirectory::new(store, jwt, 4)
    }

    #[test]
    fn test_create_then_verify_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let dir = directory(store.clone());

        let identity = dir
            .create_account("jo@example.com", "Jo Driver", "temp-credential")
            .unwrap();
        assert_eq!(identity.email, "jo@example.com");

        let token = dir
            .jwt
            .generate_access_token(identity.id, &identity.email)
            .unwrap();
        let actor = dir.verify_token(&token).unwrap();
        assert_eq!(actor.id, identity.id);
        assert_eq!(actor.email, "jo@example.com");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = Arc::new(MemoryStore::new());
        let dir = directory(store);

        dir.create_account("jo@example.com", "Jo", "cred").unwrap();
        let err = dir
            .create_account("jo@example.com", "Other Jo", "cred2")
            .unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateEmail));
    }

    #[test]
    fn test_token_for_deleted_account_rejected() {
        let store = Arc::new(MemoryStore::new());
        let dir = directory(store);

        let identity = dir.create_account("jo@example.com", "Jo", "cred").unwrap();
        let token = dir
            .jwt
            .generate_access_token(identity.id, &identity.email)
            .unwrap();

        assert!(dir.delete_account(identity.id).unwrap());
        assert!(matches!(
            dir.verify_token(&token),
            Err(DirectoryError::UnknownAccount)
        ));
    }

    #[test]
    fn test_delete_missing_account_reports_false() {
        let store = Arc::new(MemoryStore::new());
        let dir = directory(store);
        assert!(!dir.delete_account(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let store = Arc::new(MemoryStore::new());
        let dir = directory(store);
        assert!(matches!(
            dir.verify_token("not.a.jwt"),
            Err(DirectoryError::InvalidToken)
        ));
    }
}
