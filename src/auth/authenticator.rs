//! Registration and login. These are the only paths that mint tokens.

use super::{
    HashError, PasswordHasher, TokenCodec, TokenError, now_unix,
    utils::{is_email_identifier, normalize_email},
};
use crate::{
    model::{Identity, Role},
    store::{CredentialStore, StoreError, UniqueField},
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", duplicate_message(.0))]
    DuplicateIdentifier(UniqueField),
    #[error("Invalid username/email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

fn duplicate_message(field: &UniqueField) -> &'static str {
    match field {
        UniqueField::Username => "Username is already taken",
        UniqueField::Email => "Email is already in use",
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => Self::DuplicateIdentifier(field),
            other => Self::Store(other),
        }
    }
}

/// Registration input, already validated by the caller.
#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    /// Accepted for compatibility and ignored; new accounts are always `USER`.
    pub requested_role: Option<String>,
}

/// A freshly authenticated identity and its token.
#[derive(Debug)]
pub struct Authenticated {
    pub identity: Identity,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    codec: Arc<TokenCodec>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            credentials,
            hasher,
            codec,
        }
    }

    #[must_use]
    pub fn codec(&self) -> Arc<TokenCodec> {
        Arc::clone(&self.codec)
    }

    /// Create a `USER` identity and mint its first token.
    ///
    /// # Errors
    /// [`AuthError::DuplicateIdentifier`] when the username or email is taken,
    /// otherwise store, hashing or token failures.
    #[instrument(skip_all, fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<Authenticated, AuthError> {
        let username = registration.username.trim().to_string();
        let email = normalize_email(&registration.email);

        if self.credentials.exists_by_username(&username).await? {
            return Err(AuthError::DuplicateIdentifier(UniqueField::Username));
        }
        if self.credentials.exists_by_email(&email).await? {
            return Err(AuthError::DuplicateIdentifier(UniqueField::Email));
        }

        if let Some(requested) = registration
            .requested_role
            .as_deref()
            .filter(|role| !role.trim().eq_ignore_ascii_case(Role::User.as_str()))
        {
            warn!(requested, "ignoring requested role on registration");
        }

        let password_hash = self
            .hasher
            .hash(registration.password.expose_secret())
            .await?;
        let identity = Identity {
            id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            role: Role::User,
        };
        // a concurrent registration can still win between the checks and here
        self.credentials.insert(&identity).await?;
        info!(user_id = %identity.id, "user registered");

        self.issue(identity)
    }

    /// Resolve the identifier, check the password and mint a token.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] for an unknown identifier or a wrong
    /// password, otherwise store or token failures.
    #[instrument(skip_all)]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Authenticated, AuthError> {
        let identifier = identifier.trim();
        let identity = if is_email_identifier(identifier) {
            self.credentials
                .find_by_email(&normalize_email(identifier))
                .await?
        } else {
            self.credentials.find_by_username(identifier).await?
        };

        let Some(identity) = identity else {
            self.hasher.verify_dummy(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &identity.password_hash).await {
            return Err(AuthError::InvalidCredentials);
        }
        info!(user_id = %identity.id, "login succeeded");

        self.issue(identity)
    }

    /// Make sure an `ADMIN` with this username exists. An existing account is left untouched.
    ///
    /// # Errors
    /// Returns store or hashing failures, or a duplicate when the email belongs to another account.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        let username = username.trim();
        if let Some(existing) = self.credentials.find_by_username(username).await? {
            if existing.role != Role::Admin {
                warn!("bootstrap admin account exists without the ADMIN role; leaving it unchanged");
            }
            return Ok(existing);
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            username: username.to_string(),
            password_hash: self.hasher.hash(password.expose_secret()).await?,
            role: Role::Admin,
        };
        self.credentials.insert(&identity).await?;
        info!(user_id = %identity.id, "bootstrap admin created");
        Ok(identity)
    }

    fn issue(&self, identity: Identity) -> Result<Authenticated, AuthError> {
        let token = self
            .codec
            .mint(identity.id, &identity.username, identity.role, now_unix())?;
        Ok(Authenticated {
            identity,
            token,
            expires_in: self.codec.ttl_seconds(),
        })
    }
}
