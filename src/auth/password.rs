//! Argon2id password hashing.
//!
//! Hashing is CPU bound, so both operations run on the blocking pool.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::error;

const DUMMY_PASSWORD: &str = "taskmaster-dummy-password";

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // digest used when the account does not exist, so login timing matches
    dummy_hash: Arc<str>,
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("algorithm", &"argon2id")
            .finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// Argon2id with the crate's default cost parameters.
    ///
    /// # Errors
    /// Returns an error if the dummy digest cannot be computed.
    pub fn new() -> Result<Self, HashError> {
        Self::with_params(Params::default())
    }

    /// # Errors
    /// Returns an error if the dummy digest cannot be computed.
    pub fn with_params(params: Params) -> Result<Self, HashError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;
        Ok(Self {
            argon2,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Cheap parameters for tests.
    ///
    /// # Errors
    /// Returns an error if the parameters are rejected.
    pub fn insecure_for_tests() -> Result<Self, HashError> {
        let params =
            Params::new(1024, 1, 1, None).map_err(|err| HashError::Params(err.to_string()))?;
        Self::with_params(params)
    }

    /// Hash with a fresh random salt; two calls on the same input differ.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let argon2 = self.argon2.clone();
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hash_with(&argon2, &plaintext)).await?
    }

    /// Constant-time verification. A digest that does not parse verifies as `false`.
    pub async fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let argon2 = self.argon2.clone();
        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();
        match tokio::task::spawn_blocking(move || verify_with(&argon2, &plaintext, &digest)).await
        {
            Ok(verified) => verified,
            Err(err) => {
                error!("password verification task failed: {err}");
                false
            }
        }
    }

    /// Burn the same work as a real verification. Always `false`.
    pub async fn verify_dummy(&self, plaintext: &str) -> bool {
        let dummy = Arc::clone(&self.dummy_hash);
        let _ = self.verify(plaintext, &dummy).await;
        false
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| HashError::Hash(err.to_string()))
}

fn verify_with(argon2: &Argon2<'_>, plaintext: &str, digest: &str) -> bool {
    PasswordHash::new(digest).is_ok_and(|parsed| {
        argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    })
}
