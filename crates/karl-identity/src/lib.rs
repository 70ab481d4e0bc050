//! Identity Service (C7): password salting/hashing, CSPRNG token issuance,
//! and constant-time comparison for the session-ticket protocol in
//! `karl-facade`.
//!
//! `H(secret, salt)` is Argon2id's raw-output mode rather than its usual
//! PHC-string encoding: the same primitive keys both the
//! `password -> password_hashed` step and the
//! `password_hashed -> expected ticket response` step, so it has to accept
//! arbitrary byte strings on both sides, not just UTF-8 passwords.

use argon2::Argon2;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Length in bytes of every salt, nonce, and token this crate produces.
pub const TOKEN_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] argon2::Error),
}

/// Draw `TOKEN_LEN` random bytes from the OS CSPRNG. Used for password
/// salts, sessionticket nonces, and session tokens alike.
#[must_use]
pub fn random_token() -> [u8; TOKEN_LEN] {
    let mut buf = [0u8; TOKEN_LEN];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// `H(secret, salt)`: Argon2id over arbitrary bytes, truncated/extended to
/// exactly `TOKEN_LEN` bytes of raw output (no PHC string wrapper).
///
/// # Errors
///
/// Returns [`IdentityError::Hash`] if Argon2's parameters reject the input
/// (this only happens for degenerate salt lengths; `TOKEN_LEN` is safely
/// within range).
pub fn hash(secret: &[u8], salt: &[u8]) -> Result<[u8; TOKEN_LEN], IdentityError> {
    let mut out = [0u8; TOKEN_LEN];
    Argon2::default().hash_password_into(secret, salt, &mut out)?;
    Ok(out)
}

/// Compares two byte strings in constant time, independent of length-based
/// short-circuiting on `!=` length (still not constant time, but length is
/// never secret here: tokens are always `TOKEN_LEN`).
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Generates a salt and the corresponding `password_hashed = H(password, salt)`,
/// as used by `create_user`.
///
/// # Errors
///
/// Returns [`IdentityError::Hash`] if hashing fails.
pub fn hash_new_password(password: &str) -> Result<([u8; TOKEN_LEN], [u8; TOKEN_LEN]), IdentityError> {
    let salt = random_token();
    let hashed = hash(password.as_bytes(), &salt)?;
    Ok((salt, hashed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_given_same_salt() {
        let salt = random_token();
        let a = hash(b"hunter2", &salt).unwrap();
        let b = hash(b"hunter2", &salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_give_different_hashes() {
        let salt_a = random_token();
        let salt_b = random_token();
        assert_ne!(salt_a, salt_b);
        let a = hash(b"hunter2", &salt_a).unwrap();
        let b = hash(b"hunter2", &salt_b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_matches_equality() {
        let a = [1u8, 2, 3];
        let b = [1u8, 2, 3];
        let c = [1u8, 2, 4];
        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
    }

    #[test]
    fn random_token_is_not_all_zero() {
        let token = random_token();
        assert_ne!(token, [0u8; TOKEN_LEN]);
    }

    #[test]
    fn hash_new_password_round_trips_with_hash() {
        let (salt, hashed) = hash_new_password("correct horse battery staple").unwrap();
        let recomputed = hash(b"correct horse battery staple", &salt).unwrap();
        assert_eq!(hashed, recomputed);
    }
}
