//! Bearer token guard for protected routes.

use super::{TokenCodec, TokenError, now_unix};
use crate::{
    api::error::ApiError,
    model::Role,
    store::{CredentialStore, StoreError},
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

/// The acting identity, resolved from a verified token and the live store record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("missing bearer token")]
    MissingToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("subject {0} no longer exists")]
    UnknownSubject(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AccessGuard {
    codec: Arc<TokenCodec>,
    credentials: Arc<dyn CredentialStore>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(codec: Arc<TokenCodec>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { codec, credentials }
    }

    /// Extract, verify and resolve. The role comes from the store, not the token,
    /// so a role change applies on the next request.
    ///
    /// # Errors
    /// Any failure yields a [`GuardError`]; callers treat all of them as unauthenticated.
    pub async fn authenticate(&self, headers: &HeaderMap, now: i64) -> Result<Principal, GuardError> {
        let token = extract_bearer_token(headers).ok_or(GuardError::MissingToken)?;
        let claims = self.codec.verify(&token, now)?;
        let identity = self
            .credentials
            .find_by_id(claims.user_id)
            .await?
            .ok_or(GuardError::UnknownSubject(claims.user_id))?;

        Ok(Principal {
            user_id: identity.id,
            username: identity.username,
            role: identity.role,
        })
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Middleware for protected routers: rejects with 401 or attaches the [`Principal`].
///
/// # Errors
/// Returns [`ApiError::Unauthenticated`] when the guard fails.
pub async fn require_auth(
    State(guard): State<Arc<AccessGuard>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match guard.authenticate(request.headers(), now_unix()).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(GuardError::Store(err)) => {
            error!("failed to resolve token subject: {err}");
            Err(ApiError::Unauthenticated)
        }
        Err(err) => {
            debug!("rejected request: {err}");
            Err(ApiError::Unauthenticated)
        }
    }
}
