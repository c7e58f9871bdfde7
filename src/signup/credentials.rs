//! Password hashing.
//!
//! Passwords are hashed with Argon2id (version 0x13) and stored as PHC strings.
//! The default work factor is m=19456 KiB, t=2, p=1.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub const DEFAULT_MEMORY_KIB: u32 = 19_456;
pub const DEFAULT_ITERATIONS: u32 = 2;
pub const DEFAULT_PARALLELISM: u32 = 1;

const SALT_LEN: usize = 16;

/// Errors never carry the plaintext or the stored hash.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid password hashing parameters")]
    Params,
    #[error("failed to generate salt")]
    Salt,
    #[error("failed to hash password")]
    Hash,
    #[error("stored password hash is malformed")]
    Malformed,
}

pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing digest.
    ///
    /// # Errors
    /// Returns an error if salt generation or hashing fails.
    fn hash(&self, plaintext: &SecretString) -> Result<String, HashError>;

    /// Check a plaintext password against a digest produced by [`Self::hash`].
    ///
    /// # Errors
    /// Returns an error if the stored digest cannot be parsed.
    fn verify(&self, plaintext: &SecretString, stored: &str) -> Result<bool, HashError>;
}

#[derive(Clone, Debug)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Hasher with the documented default work factor.
    ///
    /// # Errors
    /// Returns [`HashError::Params`] if the parameters are rejected.
    pub fn new() -> Result<Self, HashError> {
        Self::with_cost(DEFAULT_MEMORY_KIB, DEFAULT_ITERATIONS, DEFAULT_PARALLELISM)
    }

    /// # Errors
    /// Returns [`HashError::Params`] if the parameters are rejected.
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|_| HashError::Params)?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &SecretString) -> Result<String, HashError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt).map_err(|_| HashError::Salt)?;
        let salt = SaltString::encode_b64(&salt).map_err(|_| HashError::Salt)?;

        self.argon2()
            .hash_password(plaintext.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| HashError::Hash)
    }

    fn verify(&self, plaintext: &SecretString, stored: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored).map_err(|_| HashError::Malformed)?;
        // Parameters come from the PHC string, not from `self`.
        Ok(self
            .argon2()
            .verify_password(plaintext.expose_secret().as_bytes(), &parsed)
            .is_ok())
    }
}
