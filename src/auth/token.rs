//! HS512 access tokens.
//!
//! Wire format: `base64url(header).base64url(claims).base64url(signature)`, all
//! segments unpadded, signature = HMAC-SHA-512 over the first two segments.

use crate::model::Role;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const ALGORITHM: &str = "HS512";
/// HS512 block strength.
pub const MIN_SECRET_BYTES: usize = 64;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("signing secret is not configured")]
    Missing,
    #[error("signing secret must be at least 64 bytes, got {0}")]
    TooShort(usize),
    #[error("failed to generate a random signing key: {0}")]
    Random(#[from] rand::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn hs512() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Verified token contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Username of the subject.
    pub sub: String,
    pub role: Role,
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn username(&self) -> &str {
        &self.sub
    }

    #[must_use]
    pub const fn issued_at(&self) -> i64 {
        self.iat
    }

    #[must_use]
    pub const fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    Configured,
    Generated,
}

/// Process-wide HMAC key. Built once at startup and never mutated.
pub struct SigningKey {
    bytes: SecretSlice<u8>,
    source: KeySource,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl SigningKey {
    /// Build the key from configuration.
    ///
    /// A missing secret or one shorter than [`MIN_SECRET_BYTES`] falls back to a
    /// random key unless `strict` is set.
    ///
    /// # Errors
    /// Returns an error in strict mode when the secret is missing or too short,
    /// or when the operating system RNG fails.
    pub fn from_secret(secret: Option<&SecretString>, strict: bool) -> Result<Self, KeyError> {
        let problem = match secret {
            Some(secret) if secret.expose_secret().len() >= MIN_SECRET_BYTES => {
                return Ok(Self {
                    bytes: SecretSlice::from(secret.expose_secret().as_bytes().to_vec()),
                    source: KeySource::Configured,
                });
            }
            Some(secret) => KeyError::TooShort(secret.expose_secret().len()),
            None => KeyError::Missing,
        };

        if strict {
            return Err(problem);
        }

        warn!(
            "{problem}; using a random {MIN_SECRET_BYTES}-byte signing key. Tokens will not \
             survive a restart and are not accepted by other instances"
        );
        Self::generate()
    }

    /// Random key for the lifetime of the process.
    ///
    /// # Errors
    /// Returns an error if the operating system RNG fails.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = vec![0u8; MIN_SECRET_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self {
            bytes: SecretSlice::from(bytes),
            source: KeySource::Generated,
        })
    }

    #[must_use]
    pub const fn source(&self) -> KeySource {
        self.source
    }

    fn mac(&self) -> Result<HmacSha512, TokenError> {
        HmacSha512::new_from_slice(self.bytes.expose_secret())
            .map_err(|err| TokenError::Encoding(err.to_string()))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|err| TokenError::Encoding(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[derive(Debug)]
pub struct TokenCodec {
    key: SigningKey,
    ttl_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub const fn new(key: SigningKey, ttl_seconds: i64) -> Self {
        Self { key, ttl_seconds }
    }

    #[must_use]
    pub const fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub const fn source(&self) -> KeySource {
        self.key.source()
    }

    /// Mint a token that expires `ttl_seconds` after `now`.
    ///
    /// # Errors
    /// Returns [`TokenError::Encoding`] if the header or claims cannot be serialized.
    pub fn mint(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: username.to_string(),
            role,
            user_id,
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
        };
        let signing_input = format!("{}.{}", b64e_json(&Header::hs512())?, b64e_json(&claims)?);

        let mut mac = self.key.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    /// Verify the signature, then the expiry, and return the claims.
    ///
    /// # Errors
    /// See [`TokenError`]; the first failing check wins.
    pub fn verify(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let signature_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() {
            return Err(TokenError::Malformed);
        }

        let header: Header = b64d_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(signature_b64)
            .map_err(|_| TokenError::InvalidSignature)?;
        let mut mac = self.key.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
