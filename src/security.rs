//! Password hashing and verification.
//! Argon2id with a random per-record salt, emitted as a PHC string so the salt
//! and parameters travel inside the hash itself. Verification is constant-time
//! inside the argon2 crate and never logs or returns the plaintext.

use anyhow::anyhow;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::error::{AppError, AppResult};

/// Minimum accepted password length, enforced at the registration boundary.
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::from(anyhow!(e.to_string())))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::from(anyhow!(e.to_string())))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::from(anyhow!(e.to_string())))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}
