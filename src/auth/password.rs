use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;
use uuid::Uuid;

lazy_static! {
    static ref DECOY_HASH: String = Argon2Codec
        .hash(&Uuid::new_v4().to_string())
        .unwrap_or_default();
}

/// Argon2 hash of a random secret nobody knows. Verifying against it costs the
/// same as checking a real account's password.
pub fn decoy_hash() -> &'static str {
    DECOY_HASH.as_str()
}

/// One-way password hashing.
pub trait CredentialCodec: Send + Sync {
    /// Salted hash; two calls with the same input never agree.
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    /// `Ok(false)` on mismatch, `Err` only when `hash` is not a valid PHC string.
    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool>;
}

/// Argon2id with the crate's fixed default cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Codec;

impl CredentialCodec for Argon2Codec {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoy_hash_is_a_real_hash_that_matches_nothing() {
        let codec = Argon2Codec;
        assert!(decoy_hash().starts_with("$argon2"));
        assert!(!codec.verify("password123", decoy_hash()).unwrap());
        assert_eq!(decoy_hash(), decoy_hash());
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let codec = Argon2Codec;
        let password = "Secur3P@ssw0rd!";
        let hash = codec.hash(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(codec.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let codec = Argon2Codec;
        let hash = codec.hash("correct-horse-battery-staple").unwrap();
        assert!(!codec.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_input_gets_distinct_salts() {
        let codec = Argon2Codec;
        let a = codec.hash("password123").unwrap();
        let b = codec.hash("password123").unwrap();
        assert_ne!(a, b);
        assert!(codec.verify("password123", &a).unwrap());
        assert!(codec.verify("password123", &b).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = Argon2Codec.verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
