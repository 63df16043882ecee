//! Token issuance settings.

use super::{KeyError, SigningKey, TokenCodec};
use secrecy::SecretString;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_secret: Option<SecretString>,
    token_ttl_seconds: i64,
    strict_signing_secret: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signing_secret: None,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            strict_signing_secret: false,
        }
    }

    #[must_use]
    pub fn with_signing_secret(mut self, secret: Option<SecretString>) -> Self {
        self.signing_secret = secret;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_strict_signing_secret(mut self, strict: bool) -> Self {
        self.strict_signing_secret = strict;
        self
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn strict_signing_secret(&self) -> bool {
        self.strict_signing_secret
    }

    /// Build the process-wide codec. Called once at startup.
    ///
    /// # Errors
    /// Returns an error when the key cannot be built (see [`SigningKey::from_secret`]).
    pub fn build_codec(&self) -> Result<TokenCodec, KeyError> {
        let key = SigningKey::from_secret(self.signing_secret.as_ref(), self.strict_signing_secret)?;
        Ok(TokenCodec::new(key, self.token_ttl_seconds))
    }
}
