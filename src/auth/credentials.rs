//! Credential hashing with Argon2id and temporary credential generation.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use rand::rngs::OsRng;
use rand::Rng;

/// Alphabet for generated temporary credentials. Ambiguous glyphs (0/O,
/// 1/l/I) are excluded since these get read to drivers over the phone.
const TEMP_CREDENTIAL_ALPHABET: &[u8] =
    b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Strength rule for caller-chosen credentials. Generated temporary
/// credentials bypass this; they are longer than the floor by
/// construction.
pub struct CredentialPolicy;

impl CredentialPolicy {
    pub const MIN_LENGTH: usize = 8;

    pub fn check(credential: &str) -> Result<(), String> {
        if credential.len() < Self::MIN_LENGTH {
            return Err(format!(
                "credential must be at least {} characters",
                Self::MIN_LENGTH
            ));
        }
        Ok(())
    }
}

pub struct CredentialService;

impl CredentialService {
    pub fn hash(credential: &str) -> Result<String, argon2::password_hash::Error> {
        Self::hash_with_cost(credential, 12)
    }

    /// Hashes a credential using Argon2id with configurable memory cost.
    ///
    /// The cost parameter controls the memory usage (in KiB = 2^cost).
    /// Recommended values:
    /// - 12: ~4MB memory, suitable for development/testing
    /// - 16: ~64MB memory, suitable for production
    pub fn hash_with_cost(
        credential: &str,
        memory_cost_log2: u32,
    ) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let m_cost = 1u32 << memory_cost_log2.min(22); // Cap at 4GB

        let params =
            Params::new(m_cost, 3, 1, None).map_err(|_| argon2::password_hash::Error::Algorithm)?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let credential_hash = argon2.hash_password(credential.as_bytes(), &salt)?;
        Ok(credential_hash.to_string())
    }

    pub fn verify(
        credential: &str,
        credential_hash: &str,
    ) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(credential_hash)?;
        let argon2 = Argon2::default();
        match argon2.verify_password(credential.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Generates a random temporary credential for directly-provisioned
    /// accounts. The raw value is handed to the admin exactly once; only
    /// the hash is stored.
    pub fn generate_temp(length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length.max(12))
            .map(|_| {
                let idx = rng.gen_range(0..TEMP_CREDENTIAL_ALPHABET.len());
                TEMP_CREDENTIAL_ALPHABET[idx] as char
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let credential = "secure_credential_123";
        let hash = CredentialService::hash_with_cost(credential, 4).expect("Hashing should succeed");

        let is_valid =
            CredentialService::verify(credential, &hash).expect("Verification should succeed");
        assert!(is_valid);
    }

    #[test]
    fn test_wrong_credential_fails() {
        let hash =
            CredentialService::hash_with_cost("correct_value", 4).expect("Hashing should succeed");

        let is_valid =
            CredentialService::verify("wrong_value", &hash).expect("Verification should succeed");
        assert!(!is_valid);
    }

    #[test]
    fn test_unique_salts() {
        let credential = "same_value";
        let hash1 =
            CredentialService::hash_with_cost(credential, 4).expect("Hashing should succeed");
        let hash2 =
            CredentialService::hash_with_cost(credential, 4).expect("Hashing should succeed");

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_hash_format() {
        let hash = CredentialService::hash_with_cost("test", 4).expect("Hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_temp_credential_shape() {
        let temp = CredentialService::generate_temp(16);
        assert_eq!(temp.len(), 16);
        assert!(temp
            .bytes()
            .all(|b| TEMP_CREDENTIAL_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_temp_credential_minimum_length_enforced() {
        assert_eq!(CredentialService::generate_temp(4).len(), 12);
    }

    #[test]
    fn test_credential_policy_floor() {
        assert!(CredentialPolicy::check("short").is_err());
        assert!(CredentialPolicy::check("1234567").is_err());
        assert!(CredentialPolicy::check("12345678").is_ok());
    }

    #[test]
    fn test_temp_credentials_differ() {
        assert_ne!(
            CredentialService::generate_temp(16),
            CredentialService::generate_temp(16)
        );
    }
}
