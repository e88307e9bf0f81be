//! Password hashing and verification (Argon2id, PHC strings).

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use iacp_core::Password;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Hash a password with a fresh random salt.
///
/// Returns a PHC-formatted string safe for storage.
pub fn hash_password(password: &Password) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.expose().as_bytes(), &salt)
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Check a plaintext password against a stored PHC hash.
///
/// Mismatch and unparsable hashes both yield `false`; this never errors.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Run a full verification against a throwaway hash and return `false`.
///
/// Used when the account lookup already failed so the response time does not
/// reveal whether the account exists.
pub fn verify_against_dummy(plain: &str) -> bool {
    let dummy = DUMMY_HASH.get_or_init(|| {
        Password::new_secret("not-a-real-password")
            .ok()
            .and_then(|p| hash_password(&p).ok())
    });
    if let Some(hash) = dummy {
        let _ = verify_password(plain, hash);
    }
    false
}
