//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`) so the salt and parameters travel
//! with the digest and can be upgraded later without a schema change.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::warn;

use super::AuthError;

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::Hash`] if Argon2 cannot produce a hash, which in practice
/// means the host ran out of memory.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hash)
}

/// Check a password against a stored PHC hash.
///
/// A corrupt hash and a wrong password both return `false`; the difference is
/// only logged.
#[must_use]
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("Stored password hash is unreadable: {err}");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn hash_differs_from_password_and_verifies() -> Result<()> {
        let hash = hash_password("password")?;
        assert_ne!(hash, "password");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "password"));
        Ok(())
    }

    #[test]
    fn wrong_password_fails() -> Result<()> {
        let hash = hash_password("password")?;
        assert!(!verify_password(&hash, "invalid-password"));
        Ok(())
    }

    #[test]
    fn same_password_hashes_differently() -> Result<()> {
        let first = hash_password("pw123")?;
        let second = hash_password("pw123")?;
        assert_ne!(first, second);
        assert!(verify_password(&first, "pw123"));
        assert!(verify_password(&second, "pw123"));
        Ok(())
    }

    #[test]
    fn corrupt_hash_is_a_plain_mismatch() {
        assert!(!verify_password("not-a-phc-string", "password"));
        assert!(!verify_password("", ""));
    }
}
