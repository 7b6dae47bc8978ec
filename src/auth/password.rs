//! Password hashing — bcrypt, matching the cost the portal has always used.

use crate::error::AuthError;

const BCRYPT_COST: u32 = 10;

/// Hash a plaintext password for storage.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    bcrypt::hash(plain, BCRYPT_COST).map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a plaintext password against a stored hash.
///
/// A malformed stored hash counts as a failed verification rather than an
/// error; login must not leak which part failed.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
