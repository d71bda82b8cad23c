//! Password hashing for account and admin credentials.
//!
//! Uses Argon2id with a random per-password salt, stored as a PHC string.
//! The rest of the crate treats hashes as opaque text.

use anyhow::{Result, anyhow};
use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};

/// Hash a raw password into a PHC-format string.
pub fn hash_password(raw: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a raw password against a stored PHC string.
///
/// Fails closed: an undecodable stored hash verifies as false rather than
/// erroring, so a corrupt credential row can never authenticate.
pub fn verify_password(raw: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}
