//! Password hashing and verification using Argon2
//!
//! Uses the argon2id variant with default parameters. Rosters written before
//! hashing was introduced may still hold plaintext; those are accepted once
//! and flagged for re-hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::ArchiveError;

/// Outcome of checking a login password against a stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Mismatch,
    Match,
    /// Matched a plaintext credential; the caller should store a hash
    MatchNeedsRehash,
}

impl PasswordCheck {
    pub fn is_match(&self) -> bool {
        !matches!(self, PasswordCheck::Mismatch)
    }
}

/// Hash a password using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, ArchiveError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ArchiveError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
///
/// Returns true if the password matches the hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ArchiveError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ArchiveError::Auth(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with("$argon2")
}

/// Check a login attempt against whatever the roster holds.
pub fn check_password(password: &str, stored: &str) -> Result<PasswordCheck, ArchiveError> {
    if stored.is_empty() {
        return Ok(PasswordCheck::Mismatch);
    }
    if is_hashed(stored) {
        return Ok(if verify_password(password, stored)? {
            PasswordCheck::Match
        } else {
            PasswordCheck::Mismatch
        });
    }
    Ok(if constant_time_eq(password.as_bytes(), stored.as_bytes()) {
        PasswordCheck::MatchNeedsRehash
    } else {
        PasswordCheck::Mismatch
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
