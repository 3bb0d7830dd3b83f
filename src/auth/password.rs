use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to hash password: {0}")]
pub struct PasswordError(String);

/// Format of a stored password value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordScheme {
    /// PHC string produced by argon2 (`$argon2id$...`).
    Argon2,
    /// Hex-encoded SHA-256 digest.
    LegacySha256,
    /// Value stored as-is.
    LegacyPlain,
}

impl PasswordScheme {
    pub fn detect(stored: &str) -> Self {
        if stored.starts_with("$argon2") {
            PasswordScheme::Argon2
        } else if stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit()) {
            PasswordScheme::LegacySha256
        } else {
            PasswordScheme::LegacyPlain
        }
    }
}

/// Hashes with the current scheme.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

pub fn verify_password(plain: &str, stored: &str) -> bool {
    if stored.trim().is_empty() {
        return false;
    }

    match PasswordScheme::detect(stored) {
        PasswordScheme::Argon2 => match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        },
        // A 64-char hex value may still be somebody's literal legacy password
        PasswordScheme::LegacySha256 => {
            stored.eq_ignore_ascii_case(&sha256_hex(plain)) || stored == plain
        }
        PasswordScheme::LegacyPlain => stored == plain,
    }
}

/// True when a verified stored value should be replaced with a current-scheme hash.
pub fn needs_rehash(stored: &str) -> bool {
    PasswordScheme::detect(stored) != PasswordScheme::Argon2
}

pub fn sha256_hex(plain: &str) -> String {
    format!("{:x}", Sha256::digest(plain.as_bytes()))
}
